//! チャンクのマニフェスト作成と投入

use super::ImageRecord;
use crate::error::{BatchError, Result};
use crate::payload::PayloadBuilder;
use crate::service::{BatchJob, BatchService, CHAT_COMPLETIONS_ENDPOINT};
use photo_batch_common::{make_custom_id, ManifestEntry};
use tracing::{debug, info, warn};

/// 1チャンク分のマニフェスト
#[derive(Debug, Default)]
pub struct PreparedManifest {
    pub entries: Vec<ManifestEntry>,
    /// リクエストを作れなかった画像（custom_id, 理由）
    pub dropped: Vec<(String, BatchError)>,
}

/// チャンク内の各画像からリクエストを作る
///
/// 作れなかった画像は外して続行する。
pub fn build_manifest<P: PayloadBuilder>(chunk: &[ImageRecord], builder: &P) -> PreparedManifest {
    let mut manifest = PreparedManifest::default();

    for image in chunk {
        let custom_id = make_custom_id(&image.source_group, &image.identifier);
        match builder.build(image) {
            Ok(body) => manifest
                .entries
                .push(ManifestEntry::post(custom_id, CHAT_COMPLETIONS_ENDPOINT, body)),
            Err(e) => {
                warn!(custom_id = %custom_id, error = %e, "リクエスト作成に失敗");
                manifest.dropped.push((custom_id, e));
            }
        }
    }

    debug!(
        entries = manifest.entries.len(),
        dropped = manifest.dropped.len(),
        "マニフェストを作成"
    );
    manifest
}

/// マニフェストを1ジョブとして投入
pub async fn submit_chunk<S: BatchService>(
    service: &S,
    entries: &[ManifestEntry],
) -> Result<BatchJob> {
    let job = service.submit(entries).await?;
    info!(job_id = %job.job_id, entries = entries.len(), "バッチを投入");
    Ok(job)
}

/// 投入済みチャンクのローカル画像を消す（失敗してもログのみ）
pub fn release_local_files(chunk: &[ImageRecord]) {
    for image in chunk {
        if let Err(e) = std::fs::remove_file(&image.local_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %image.local_path.display(), error = %e, "ローカル画像の削除に失敗");
            }
        }
    }
}
