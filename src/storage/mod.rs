//! オブジェクトストレージ
//!
//! - S3Store: 本番用（aws-sdk-s3）
//! - LocalStore: ローカルディレクトリをバケットとみなす実装
//!
//! キーは常に `/` 区切り。呼び出しごとに `RequestMetrics` を渡して回数を数える。

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

use crate::error::{BatchError, Result};
use crate::metrics::RequestMetrics;
use std::path::Path;

/// 取得したオブジェクトと、その時点のバージョン（ETag等）
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub version: String,
}

/// 書き込み時の前提条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// まだ存在しないこと
    MustNotExist,
    /// 現在のバージョンが一致すること
    MatchVersion(String),
}

#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// prefix 直下の共通プレフィックス（末尾 `/` 付き）
    async fn list_prefixes(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>>;

    /// prefix 配下の全オブジェクトキー
    async fn list_keys(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>>;

    /// 存在しなければ `Ok(None)`
    async fn get(&self, key: &str, metrics: &RequestMetrics) -> Result<Option<StoredObject>>;

    /// 書き込み後の新しいバージョンを返す。前提条件を満たさなければ `BatchError::Conflict`
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
        metrics: &RequestMetrics,
    ) -> Result<String>;

    /// オブジェクトをローカルファイルに保存
    async fn download_to(&self, key: &str, dest: &Path, metrics: &RequestMetrics) -> Result<()> {
        let object = self
            .get(key, metrics)
            .await?
            .ok_or_else(|| BatchError::ObjectNotFound(key.to_string()))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, object.bytes)?;
        Ok(())
    }
}

/// `a/b/c.jpg` → `c.jpg`
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// プレフィックスを `x/` 形式にそろえる（空はそのまま）
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
