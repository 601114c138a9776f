//! 結果テーブル永続化テスト
//!
//! 追記専用の保存と、他の実行との競合検出を検証

use photo_batch::error::BatchError;
use photo_batch::metrics::RequestMetrics;
use photo_batch::storage::{LocalStore, ObjectStore, Precondition};
use photo_batch::store::{ResultStore, ResultTable};
use photo_batch_common::AnalysisResult;
use tempfile::tempdir;

const KEY: &str = "results/image_analysis_results.csv";

fn result(image: &str) -> AnalysisResult {
    AnalysisResult {
        folder_name: "ig_pics/alice".to_string(),
        image_name: image.to_string(),
        ..Default::default()
    }
}

/// 存在しないテーブルは空として読み込み、初回保存で作成
#[tokio::test]
async fn test_load_missing_then_create() {
    let bucket = tempdir().expect("Failed to create temp dir");
    let store = LocalStore::new(bucket.path());
    let metrics = RequestMetrics::new();

    let (mut result_store, mut table) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    assert!(table.is_empty());
    assert!(result_store.version().is_none());

    table.append(&[result("a.jpg")]);
    result_store.persist(&table, &metrics).await.unwrap();
    assert!(result_store.version().is_some());
    assert!(bucket.path().join(KEY).exists());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.download, 1);
    assert_eq!(snapshot.upload, 1);
}

/// チャンクごとの保存は前回分を含み、行は減らない
#[tokio::test]
async fn test_persist_is_append_only() {
    let bucket = tempdir().expect("Failed to create temp dir");
    let store = LocalStore::new(bucket.path());
    let metrics = RequestMetrics::new();

    let (mut result_store, mut table) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    table.append(&[result("a.jpg"), result("b.jpg")]);
    result_store.persist(&table, &metrics).await.unwrap();
    table.append(&[result("c.jpg")]);
    result_store.persist(&table, &metrics).await.unwrap();

    let (_, reloaded) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    assert_eq!(reloaded.len(), 3);
    let index = reloaded.processed_index();
    for id in ["a.jpg", "b.jpg", "c.jpg"] {
        assert!(index.contains(id), "{} が処理済みになっていない", id);
    }
}

/// 読み込み後に他から更新されていたら保存は競合エラー
#[tokio::test]
async fn test_persist_detects_concurrent_writer() {
    let bucket = tempdir().expect("Failed to create temp dir");
    let store = LocalStore::new(bucket.path());
    let metrics = RequestMetrics::new();

    let (mut first, mut table) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    let (mut second, mut other) = ResultStore::load(&store, KEY, &metrics).await.unwrap();

    other.append(&[result("other.jpg")]);
    second.persist(&other, &metrics).await.unwrap();

    table.append(&[result("mine.jpg")]);
    let err = first.persist(&table, &metrics).await.unwrap_err();
    assert!(matches!(err, BatchError::Conflict(_)));

    // 先に保存した側の内容が残る
    let (_, reloaded) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    assert!(reloaded.processed_index().contains("other.jpg"));
    assert!(!reloaded.processed_index().contains("mine.jpg"));
}

/// 古い形式のテーブルに追記しても既存の列と行は保たれる
#[tokio::test]
async fn test_append_to_legacy_table() {
    let bucket = tempdir().expect("Failed to create temp dir");
    let store = LocalStore::new(bucket.path());
    let metrics = RequestMetrics::new();
    store
        .put(
            KEY,
            b"folder_name,image_name,note\nig_pics/old,old.jpg,\"hand, written\"\n".to_vec(),
            Precondition::MustNotExist,
            &metrics,
        )
        .await
        .unwrap();

    let (mut result_store, mut table) = ResultStore::load(&store, KEY, &metrics).await.unwrap();
    assert!(table.processed_index().contains("old.jpg"));
    table.append(&[result("new.jpg")]);
    result_store.persist(&table, &metrics).await.unwrap();

    let bytes = std::fs::read(bucket.path().join(KEY)).unwrap();
    let reloaded = ResultTable::from_csv(&bytes).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.headers()[2], "note");
    assert_eq!(reloaded.rows()[0][2], "hand, written");
    assert_eq!(reloaded.headers().len(), AnalysisResult::column_count() + 1);
}
