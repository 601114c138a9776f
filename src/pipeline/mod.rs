//! バッチ画像解析パイプライン
//!
//! 棚卸し → 処理済み除外 → チャンク分割 →
//! チャンクごとに {投入 → 完了待ち → 出力解析 → 追記・保存} を順に実行する。
//!
//! 保存はチャンク単位。途中で止まっても、保存済みのチャンクは次回の実行でスキップされる。

mod chunker;
mod dedup;
mod inventory;
mod poller;
mod results;
mod submitter;

pub use chunker::plan_chunks;
pub use dedup::filter_processed;
pub use inventory::{is_image_key, list_source_groups, resolve_inventory, ImageRecord, Inventory};
pub use poller::{wait_for_terminal, PollOptions};
pub use results::{parse_job_output, ParseReport};
pub use submitter::{build_manifest, release_local_files, submit_chunk, PreparedManifest};

use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::metrics::{RequestMetrics, RequestMetricsSnapshot};
use crate::notify::{notify, Notifier};
use crate::payload::PayloadBuilder;
use crate::service::{BatchService, JobStatus};
use crate::storage::ObjectStore;
use crate::store::{ProcessedIndex, ResultStore};
use chrono::Local;
use photo_batch_common::AnalysisResult;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

/// 実行ごとの設定
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source_prefix: String,
    pub results_key: String,
    pub work_dir: PathBuf,
    pub batch_size: usize,
    pub poll: PollOptions,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_prefix: config.source_prefix.clone(),
            results_key: config.results_key.clone(),
            work_dir: config.work_dir.clone(),
            batch_size: config.batch_size,
            poll: PollOptions {
                interval: config.poll_interval(),
                timeout: config.poll_timeout(),
            },
        }
    }
}

/// 1回の実行の集計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// 棚卸しで見つかった画像数
    pub total_images: usize,
    pub skipped: usize,
    pub pending: usize,
    pub chunks: usize,
    pub completed_chunks: usize,
    /// 失敗・期限切れ・取消・タイムアウトで結果が得られなかったチャンク
    pub failed_chunks: usize,
    pub rows_added: usize,
    /// リクエストを作れなかった画像
    pub dropped_images: usize,
    pub incomplete_rows: usize,
    pub decode_failures: usize,
    pub requests: RequestMetricsSnapshot,
}

impl RunReport {
    /// 0: 全チャンク完了、2: 一部のチャンクが失敗
    pub fn exit_code(&self) -> i32 {
        if self.failed_chunks > 0 {
            2
        } else {
            0
        }
    }
}

/// チャンク1つの結末
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Completed,
    Failed,
    /// 投入できるリクエストが無かった
    Skipped,
}

#[derive(Debug)]
struct ChunkOutcome {
    state: ChunkState,
    results: Vec<AnalysisResult>,
    dropped: usize,
    incomplete: usize,
    decode_failures: usize,
}

impl ChunkOutcome {
    fn new(state: ChunkState, dropped: usize) -> Self {
        Self {
            state,
            results: Vec::new(),
            dropped,
            incomplete: 0,
            decode_failures: 0,
        }
    }
}

pub struct Pipeline<'a, S, B, N, P> {
    store: &'a S,
    service: &'a B,
    notifier: &'a N,
    builder: &'a P,
    options: PipelineOptions,
}

impl<'a, S, B, N, P> Pipeline<'a, S, B, N, P>
where
    S: ObjectStore,
    B: BatchService,
    N: Notifier,
    P: PayloadBuilder,
{
    pub fn new(
        store: &'a S,
        service: &'a B,
        notifier: &'a N,
        builder: &'a P,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            service,
            notifier,
            builder,
            options,
        }
    }

    /// パイプラインを最後まで実行
    ///
    /// 個々のチャンクの失敗では止まらない。ストレージ障害・保存の競合・中断は `Err`。
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> Result<RunReport> {
        let started = Local::now();
        let metrics = RequestMetrics::new();
        let mut report = RunReport::default();

        self.notify(&format!(
            "🚀 バッチ画像解析を開始 ({})",
            started.format("%Y-%m-%d %H:%M:%S")
        ))
        .await;

        let (mut result_store, mut table) =
            ResultStore::load(self.store, &self.options.results_key, &metrics).await?;
        let index = table.processed_index();
        info!(rows = table.len(), processed = index.len(), "処理済み画像を確認");

        let inventory = resolve_inventory(
            self.store,
            &self.options.source_prefix,
            &self.options.work_dir,
            &metrics,
        )
        .await?;
        report.total_images = inventory.total();

        let (pending, skipped) = filter_processed(inventory.into_records(), &index);
        report.skipped = skipped;
        report.pending = pending.len();
        self.notify(&format!(
            "🔍 処理済み{}枚をスキップ、残り{}枚",
            skipped,
            pending.len()
        ))
        .await;

        if pending.is_empty() {
            self.notify("❌ 新しい画像はありません").await;
            report.requests = metrics.snapshot();
            return Ok(report);
        }

        let chunks = plan_chunks(&pending, self.options.batch_size);
        report.chunks = chunks.len();
        self.notify(&format!(
            "📸 {}枚を{}バッチで処理します",
            pending.len(),
            chunks.len()
        ))
        .await;

        for (i, chunk) in chunks.iter().enumerate() {
            let number = i + 1;
            if *cancel.borrow() {
                return Err(BatchError::Cancelled);
            }
            self.notify(&format!("📤 バッチ {}/{} を処理中...", number, chunks.len()))
                .await;

            let outcome = self.process_chunk(number, chunk, &index, &mut cancel).await?;
            report.dropped_images += outcome.dropped;
            report.incomplete_rows += outcome.incomplete;
            report.decode_failures += outcome.decode_failures;
            match outcome.state {
                ChunkState::Completed => report.completed_chunks += 1,
                ChunkState::Failed => report.failed_chunks += 1,
                ChunkState::Skipped => {}
            }

            if outcome.results.is_empty() {
                self.notify(&format!("⚠️ バッチ {} の結果はありません", number))
                    .await;
                continue;
            }

            let added = table.append(&outcome.results);
            result_store.persist(&table, &metrics).await?;
            report.rows_added += added;

            let percent = report.rows_added as f64 / report.pending as f64 * 100.0;
            self.notify(&format!(
                "✅ バッチ {} 完了: {}/{}枚 ({:.2}%)",
                number, report.rows_added, report.pending, percent
            ))
            .await;
        }

        report.requests = metrics.snapshot();
        let elapsed = Local::now() - started;
        self.notify(&format!(
            "🚀 解析完了: {}枚を追加 (失敗チャンク {} / {}、所要 {}秒)\nストレージ呼び出し: {}",
            report.rows_added,
            report.failed_chunks,
            report.chunks,
            elapsed.num_seconds(),
            report.requests
        ))
        .await;

        Ok(report)
    }

    async fn process_chunk(
        &self,
        number: usize,
        chunk: &[ImageRecord],
        index: &ProcessedIndex,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<ChunkOutcome> {
        let manifest = build_manifest(chunk, self.builder);
        for (custom_id, e) in &manifest.dropped {
            self.notify(&format!("[ERROR] リクエスト作成に失敗 {}: {}", custom_id, e))
                .await;
        }
        let dropped = manifest.dropped.len();

        if manifest.entries.is_empty() {
            warn!(chunk = number, "投入できるリクエストがありません");
            release_local_files(chunk);
            return Ok(ChunkOutcome::new(ChunkState::Skipped, dropped));
        }

        let job = submit_chunk(self.service, &manifest.entries).await?;
        release_local_files(chunk);
        self.notify(&format!(
            "✅ バッチ {} を作成 (ID: {})、完了待ち...",
            number, job.job_id
        ))
        .await;

        let job = match wait_for_terminal(self.service, &job.job_id, self.options.poll, cancel).await {
            Ok(job) => job,
            Err(BatchError::PollTimeout { job_id, waited_secs }) => {
                self.notify(&format!(
                    "⏱ バッチ {} ({}) が{}秒以内に終わらないため打ち切ります",
                    number, job_id, waited_secs
                ))
                .await;
                if let Err(e) = self.service.cancel(&job_id).await {
                    warn!(job_id = %job_id, error = %e, "ジョブの取消に失敗");
                }
                return Ok(ChunkOutcome::new(ChunkState::Failed, dropped));
            }
            Err(e) => return Err(e),
        };

        if job.status != JobStatus::Completed {
            self.notify(&format!(
                "❌ バッチ {} ({}) は {} で終了しました",
                number, job.job_id, job.status
            ))
            .await;
            return Ok(ChunkOutcome::new(ChunkState::Failed, dropped));
        }

        let mut outcome = ChunkOutcome::new(ChunkState::Completed, dropped);
        let Some(handle) = job.output_handle.as_deref() else {
            warn!(job_id = %job.job_id, "完了したジョブに出力ファイルがありません");
            return Ok(outcome);
        };

        let raw = self.service.fetch_output(handle).await?;
        let parsed = parse_job_output(&raw);
        for (custom_id, reason) in &parsed.decode_failures {
            self.notify(&format!("[ERROR] JSONデコード失敗 {}: {}", custom_id, reason))
                .await;
        }

        outcome.incomplete = parsed.incomplete.len();
        outcome.decode_failures = parsed.decode_failures.len();
        outcome.results = parsed
            .results
            .into_iter()
            .filter(|r| !index.contains(&r.image_name))
            .collect();

        info!(
            chunk = number,
            rows = outcome.results.len(),
            incomplete = outcome.incomplete,
            decode_failures = outcome.decode_failures,
            "バッチ出力を解析"
        );
        Ok(outcome)
    }

    async fn notify(&self, message: &str) {
        notify(self.notifier, message).await;
    }
}
