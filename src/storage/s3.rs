use super::{ObjectStore, Precondition, StoredObject};
use crate::error::{BatchError, Result};
use crate::metrics::RequestMetrics;

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;

#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// 環境から S3 クライアントを構築
    ///
    /// - 通常: AWS標準の解決順（環境変数・設定ファイル・ロール）
    /// - `PHOTO_BATCH_S3_ENDPOINT_URL` があればエンドポイントを差し替え、パス形式を使う（MinIO等）
    pub async fn from_env(bucket: &str) -> Self {
        let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&cfg);

        if let Ok(url) = std::env::var("PHOTO_BATCH_S3_ENDPOINT_URL") {
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        Self::new(aws_sdk_s3::Client::from_conf(builder.build()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        metrics: &RequestMetrics,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut prefixes = Vec::new();
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket);
            if !prefix.is_empty() {
                req = req.prefix(prefix);
            }
            if let Some(d) = delimiter {
                req = req.delimiter(d);
            }
            if let Some(t) = token.as_deref() {
                req = req.continuation_token(t);
            }

            metrics.list.inc();
            let resp = req
                .send()
                .await
                .map_err(|e| BatchError::Storage(format!("list_objects_v2 失敗 ({}): {:?}", prefix, e)))?;

            if let Some(common) = resp.common_prefixes {
                prefixes.extend(common.into_iter().filter_map(|cp| cp.prefix));
            }
            if let Some(contents) = resp.contents {
                keys.extend(
                    contents
                        .into_iter()
                        .filter_map(|obj| obj.key)
                        .filter(|k| !k.ends_with('/')),
                );
            }

            if resp.is_truncated.unwrap_or(false) {
                token = resp.next_continuation_token;
                if token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok((prefixes, keys))
    }
}

impl ObjectStore for S3Store {
    async fn list_prefixes(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>> {
        let (prefixes, _) = self.list(prefix, Some("/"), metrics).await?;
        Ok(prefixes)
    }

    async fn list_keys(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>> {
        let (_, keys) = self.list(prefix, None, metrics).await?;
        Ok(keys)
    }

    async fn get(&self, key: &str, metrics: &RequestMetrics) -> Result<Option<StoredObject>> {
        metrics.download.inc();
        let out = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => out,
            Err(err) if is_no_such_key(&err) => return Ok(None),
            Err(err) => {
                return Err(BatchError::Storage(format!("get_object 失敗 ({}): {:?}", key, err)))
            }
        };

        let version = out.e_tag.clone().unwrap_or_default();
        let bytes = out
            .body
            .collect()
            .await
            .map_err(|e| BatchError::Storage(format!("get_object 本文の読み込み失敗 ({}): {:?}", key, e)))?
            .into_bytes()
            .to_vec();

        Ok(Some(StoredObject { bytes, version }))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
        metrics: &RequestMetrics,
    ) -> Result<String> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        req = match precondition {
            Precondition::MustNotExist => req.if_none_match("*"),
            Precondition::MatchVersion(version) => req.if_match(version),
        };

        metrics.upload.inc();
        match req.send().await {
            Ok(out) => Ok(out.e_tag.unwrap_or_default()),
            Err(err) if is_put_precondition_failed(&err) => Err(BatchError::Conflict(key.to_string())),
            Err(err) => Err(BatchError::Storage(format!("put_object 失敗 ({}): {:?}", key, err))),
        }
    }
}

fn is_no_such_key(err: &SdkError<GetObjectError>) -> bool {
    match err {
        SdkError::ServiceError(se) => se.err().is_no_such_key(),
        _ => false,
    }
}

fn is_put_precondition_failed(err: &SdkError<PutObjectError>) -> bool {
    match err {
        SdkError::ServiceError(se) => matches!(
            se.err().code(),
            Some("PreconditionFailed") | Some("ConditionalRequestConflict")
        ),
        _ => false,
    }
}
