//! OpenAI Batch API連携
//!
//! 投入はファイルアップロード（purpose=batch）→ バッチ作成の2段階。

use super::{BatchJob, BatchService, JobStatus};
use crate::error::{BatchError, Result};
use photo_batch_common::{to_jsonl, ManifestEntry};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenAiBatchService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    completion_window: String,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
}

impl From<BatchObject> for BatchJob {
    fn from(batch: BatchObject) -> Self {
        BatchJob {
            job_id: batch.id,
            status: parse_status(&batch.status),
            output_handle: batch.output_file_id,
        }
    }
}

/// OpenAIのバッチ状態を内部の状態に変換
///
/// 未知の状態は実行中として扱う（ポーリングのタイムアウトで打ち切れる）。
pub fn parse_status(status: &str) -> JobStatus {
    match status {
        "validating" => JobStatus::Pending,
        "in_progress" | "finalizing" | "cancelling" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "expired" => JobStatus::Expired,
        "cancelled" => JobStatus::Cancelled,
        _ => JobStatus::Running,
    }
}

impl OpenAiBatchService {
    pub fn new(api_key: String, base_url: &str, completion_window: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            completion_window: completion_window.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BatchError::ServiceCall(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BatchError::ServiceCall(format!("status {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BatchError::ServiceParse(e.to_string()))
    }

    async fn upload_manifest(&self, jsonl: String) -> Result<String> {
        let part = Part::bytes(jsonl.into_bytes())
            .file_name("batch_payload.jsonl")
            .mime_str("application/jsonl")
            .map_err(|e| BatchError::ServiceCall(e.to_string()))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let file: FileObject = self
            .send_json(self.client.post(self.url("/v1/files")).multipart(form))
            .await?;
        Ok(file.id)
    }
}

impl BatchService for OpenAiBatchService {
    async fn submit(&self, entries: &[ManifestEntry]) -> Result<BatchJob> {
        let jsonl = to_jsonl(entries)?;
        let input_file_id = self.upload_manifest(jsonl).await?;
        debug!(input_file_id = %input_file_id, entries = entries.len(), "マニフェストをアップロード");

        let body = json!({
            "input_file_id": input_file_id,
            "endpoint": CHAT_COMPLETIONS_ENDPOINT,
            "completion_window": self.completion_window,
        });
        let batch: BatchObject = self
            .send_json(self.client.post(self.url("/v1/batches")).json(&body))
            .await?;
        Ok(batch.into())
    }

    async fn status(&self, job_id: &str) -> Result<BatchJob> {
        let batch: BatchObject = self
            .send_json(self.client.get(self.url(&format!("/v1/batches/{}", job_id))))
            .await?;
        Ok(batch.into())
    }

    async fn fetch_output(&self, output_handle: &str) -> Result<String> {
        let response = self
            .send(self.client.get(self.url(&format!("/v1/files/{}/content", output_handle))))
            .await?;
        response
            .text()
            .await
            .map_err(|e| BatchError::ServiceCall(e.to_string()))
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        let _: BatchObject = self
            .send_json(self.client.post(self.url(&format!("/v1/batches/{}/cancel", job_id))))
            .await?;
        Ok(())
    }
}
