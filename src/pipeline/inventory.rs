//! 画像の棚卸し
//!
//! ルートプレフィックス直下のフォルダを列挙し、各フォルダの画像をダウンロードする。
//! 一覧取得・ダウンロードの失敗は実行全体のエラー（部分的な棚卸しはしない）。

use crate::error::Result;
use crate::metrics::RequestMetrics;
use crate::storage::{base_name, normalize_prefix, ObjectStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// 解析対象の画像1枚
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// 取得元フォルダ（`ig_pics/alice/` 形式）
    pub source_group: String,
    pub local_path: PathBuf,
    /// ファイル名。処理済み判定のキー
    pub identifier: String,
}

/// フォルダ順に並んだ棚卸し結果
#[derive(Debug, Default)]
pub struct Inventory {
    pub groups: Vec<(String, Vec<ImageRecord>)>,
}

impl Inventory {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|(_, images)| images.len()).sum()
    }

    pub fn into_records(self) -> Vec<ImageRecord> {
        self.groups.into_iter().flat_map(|(_, images)| images).collect()
    }
}

/// 画像の拡張子か（大文字小文字は区別しない）
pub fn is_image_key(key: &str) -> bool {
    base_name(key)
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// ルート直下のフォルダ一覧（ソート済み）
///
/// 共通プレフィックスが返らない場合はキーから導出し、
/// ルート直下に置かれた画像はルート自身をフォルダとして扱う。
pub async fn list_source_groups<S: ObjectStore>(
    store: &S,
    root_prefix: &str,
    metrics: &RequestMetrics,
) -> Result<Vec<String>> {
    let prefix = normalize_prefix(root_prefix);
    let mut groups: BTreeSet<String> = store
        .list_prefixes(&prefix, metrics)
        .await?
        .into_iter()
        .collect();

    if groups.is_empty() {
        for key in store.list_keys(&prefix, metrics).await? {
            let rest = key.strip_prefix(&prefix).unwrap_or(&key);
            match rest.split_once('/') {
                Some((folder, _)) => groups.insert(format!("{}{}/", prefix, folder)),
                None => groups.insert(prefix.clone()),
            };
        }
    }

    Ok(groups.into_iter().collect())
}

/// 全フォルダの画像を work_dir にダウンロードして棚卸しする
pub async fn resolve_inventory<S: ObjectStore>(
    store: &S,
    root_prefix: &str,
    work_dir: &Path,
    metrics: &RequestMetrics,
) -> Result<Inventory> {
    let mut inventory = Inventory::default();

    for group in list_source_groups(store, root_prefix, metrics).await? {
        let keys: Vec<String> = store
            .list_keys(&group, metrics)
            .await?
            .into_iter()
            .filter(|k| is_image_key(k))
            .collect();

        let local_dir = work_dir.join(group.replace('/', "_"));
        let progress = ProgressBar::new(keys.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(group.clone());

        let mut images = Vec::with_capacity(keys.len());
        for key in keys {
            let identifier = base_name(&key).to_string();
            let local_path = local_dir.join(&identifier);
            store.download_to(&key, &local_path, metrics).await?;
            images.push(ImageRecord {
                source_group: group.clone(),
                local_path,
                identifier,
            });
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(group = %group, images = images.len(), "フォルダの画像を取得");
        inventory.groups.push((group, images));
    }

    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"img").unwrap();
    }

    #[test]
    fn test_is_image_key() {
        assert!(is_image_key("a/b/photo.jpg"));
        assert!(is_image_key("a/b/photo.JPEG"));
        assert!(is_image_key("photo.Png"));
        assert!(!is_image_key("a/b/notes.txt"));
        assert!(!is_image_key("a/b/jpg"));
        assert!(!is_image_key("a.jpg/readme"));
    }

    #[tokio::test]
    async fn test_resolve_inventory_groups_in_order() {
        let bucket = tempdir().unwrap();
        let work = tempdir().unwrap();
        write(bucket.path(), "ig_pics/bob/b1.png");
        write(bucket.path(), "ig_pics/alice/a2.jpg");
        write(bucket.path(), "ig_pics/alice/a1.JPG");
        write(bucket.path(), "ig_pics/alice/meta.json");

        let store = LocalStore::new(bucket.path());
        let metrics = RequestMetrics::new();
        let inventory = resolve_inventory(&store, "ig_pics/", work.path(), &metrics)
            .await
            .unwrap();

        assert_eq!(inventory.total(), 3);
        assert_eq!(inventory.groups[0].0, "ig_pics/alice/");
        assert_eq!(inventory.groups[1].0, "ig_pics/bob/");

        let records = inventory.into_records();
        let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a1.JPG", "a2.jpg", "b1.png"]);
        assert!(records[0].local_path.exists());
        assert!(records[0].local_path.starts_with(work.path().join("ig_pics_alice_")));
        assert_eq!(metrics.snapshot().download, 3);
    }

    #[tokio::test]
    async fn test_images_directly_under_root() {
        let bucket = tempdir().unwrap();
        write(bucket.path(), "ig_pics/x.jpg");

        let store = LocalStore::new(bucket.path());
        let metrics = RequestMetrics::new();
        let groups = list_source_groups(&store, "ig_pics", &metrics).await.unwrap();
        assert_eq!(groups, vec!["ig_pics/"]);
    }

    #[tokio::test]
    async fn test_empty_root() {
        let bucket = tempdir().unwrap();
        let work = tempdir().unwrap();
        let store = LocalStore::new(bucket.path());
        let metrics = RequestMetrics::new();
        let inventory = resolve_inventory(&store, "ig_pics/", work.path(), &metrics)
            .await
            .unwrap();
        assert_eq!(inventory.total(), 0);
    }
}
