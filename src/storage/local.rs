use super::{normalize_prefix, ObjectStore, Precondition, StoredObject};
use crate::error::{BatchError, Result};
use crate::metrics::RequestMetrics;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// ローカルディレクトリをバケットとして扱うストア
///
/// バージョンは内容の SHA-256。
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }

    fn read_current(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn content_version(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl ObjectStore for LocalStore {
    async fn list_prefixes(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>> {
        metrics.list.inc();
        let dir = self.path_for(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let base = normalize_prefix(prefix);
        let mut prefixes = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().to_string();
                prefixes.push(format!("{}{}/", base, name));
            }
        }
        prefixes.sort();
        Ok(prefixes)
    }

    async fn list_keys(&self, prefix: &str, metrics: &RequestMetrics) -> Result<Vec<String>> {
        metrics.list.inc();
        let dir = self.path_for(prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        // 読めないディレクトリがあれば一覧は不完全になるのでエラー
        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| {
                BatchError::Storage(format!("{} の一覧取得に失敗: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_for(entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str, metrics: &RequestMetrics) -> Result<Option<StoredObject>> {
        metrics.download.inc();
        Ok(self.read_current(&self.path_for(key))?.map(|bytes| StoredObject {
            version: content_version(&bytes),
            bytes,
        }))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        precondition: Precondition,
        metrics: &RequestMetrics,
    ) -> Result<String> {
        metrics.upload.inc();
        let path = self.path_for(key);
        let current = self.read_current(&path)?;

        let satisfied = match (&precondition, &current) {
            (Precondition::MustNotExist, existing) => existing.is_none(),
            (Precondition::MatchVersion(expected), Some(existing)) => {
                content_version(existing) == *expected
            }
            (Precondition::MatchVersion(_), None) => false,
        };
        if !satisfied {
            return Err(BatchError::Conflict(key.to_string()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // 一時ファイルに書いてから置き換える
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!(".{}.tmp", file_name));
        std::fs::write(&temp_path, &bytes)?;
        std::fs::rename(&temp_path, &path)?;

        Ok(content_version(&bytes))
    }
}
