//! 非同期バッチ推論サービス
//!
//! ジョブの状態はサービス側で変化し、こちらからは参照するだけ。

mod openai;

pub use openai::{OpenAiBatchService, CHAT_COMPLETIONS_ENDPOINT};

use crate::error::Result;
use photo_batch_common::ManifestEntry;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl JobStatus {
    /// ポーリングを終える状態か
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Expired | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 投入済みジョブの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub job_id: String,
    pub status: JobStatus,
    /// 完了時の出力ファイル
    pub output_handle: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait BatchService {
    /// マニフェストを1ジョブとして投入
    async fn submit(&self, entries: &[ManifestEntry]) -> Result<BatchJob>;

    async fn status(&self, job_id: &str) -> Result<BatchJob>;

    /// 出力（1行1レスポンスのJSONL）を取得
    async fn fetch_output(&self, output_handle: &str) -> Result<String>;

    async fn cancel(&self, job_id: &str) -> Result<()>;
}
