//! ジョブ出力の解析

use photo_batch_common::{parse_output_line, AnalysisResult, LineOutcome};
use tracing::{debug, warn};

/// 出力1ファイル分の解析結果
#[derive(Debug, Default)]
pub struct ParseReport {
    pub results: Vec<AnalysisResult>,
    /// (custom_id, 状態)
    pub incomplete: Vec<(String, String)>,
    /// (custom_id, 理由)
    pub decode_failures: Vec<(String, String)>,
}

/// 出力JSONLを1行ずつ解析する。空行は無視
pub fn parse_job_output(raw: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        match parse_output_line(line) {
            LineOutcome::Parsed(result) => report.results.push(result),
            LineOutcome::Incomplete { custom_id, status } => {
                debug!(custom_id = %custom_id, status = %status, "未完了のリクエスト");
                report.incomplete.push((custom_id, status));
            }
            LineOutcome::DecodeFailed { custom_id, reason } => {
                warn!(custom_id = %custom_id, reason = %reason, "応答のデコードに失敗");
                report.decode_failures.push((custom_id, reason));
            }
        }
    }

    report
}
