//! 結果テーブル（CSV）の読み込み・追記・保存
//!
//! テーブルは行を追加するだけで削除しない。保存は毎回テーブル全体の上書きで、
//! 読み込んだときのバージョンを前提条件にして他の実行との競合を検出する。

use crate::error::{BatchError, Result};
use crate::metrics::RequestMetrics;
use crate::storage::{ObjectStore, Precondition};
use photo_batch_common::{AnalysisResult, FOLDER_COLUMN, IDENTIFIER_COLUMN};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// 実行開始時点で処理済みだった画像名の集合
#[derive(Debug, Clone, Default)]
pub struct ProcessedIndex {
    identifiers: HashSet<String>,
}

impl ProcessedIndex {
    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessedIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            identifiers: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// 結果テーブルの概要（`status` サブコマンド用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSummary {
    pub rows: usize,
    pub columns: usize,
    /// フォルダ名 → 行数
    pub folders: BTreeMap<String, usize>,
}

/// メモリ上の結果テーブル
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// CSVから読み込み。空ファイルは空テーブル
    ///
    /// 短い行は空セルで埋める。ヘッダーより長い行はエラー（保存時にセルが消えるため）。
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::new());
        }

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(BatchError::Storage(format!(
                    "結果テーブルの{}行目の列数 {} がヘッダーの列数 {} を超えています",
                    i + 2,
                    record.len(),
                    headers.len()
                )));
            }
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if !self.headers.is_empty() {
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
        }
        writer
            .into_inner()
            .map_err(|e| BatchError::Io(e.into_error()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 画像名の列から処理済み集合を作る。列がなければ空
    pub fn processed_index(&self) -> ProcessedIndex {
        let Some(idx) = self.headers.iter().position(|h| h == IDENTIFIER_COLUMN) else {
            return ProcessedIndex::default();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter(|id| !id.is_empty())
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> TableSummary {
        let mut folders = BTreeMap::new();
        if let Some(idx) = self.headers.iter().position(|h| h == FOLDER_COLUMN) {
            for row in &self.rows {
                let folder = row.get(idx).cloned().unwrap_or_default();
                *folders.entry(folder).or_insert(0) += 1;
            }
        }
        TableSummary {
            rows: self.rows.len(),
            columns: self.headers.len(),
            folders,
        }
    }

    /// 解析結果を末尾に追加
    ///
    /// 既存テーブルにない列はヘッダーの末尾に足し、既存行は空セルで埋める。
    pub fn append(&mut self, results: &[AnalysisResult]) -> usize {
        if results.is_empty() {
            return 0;
        }

        let columns = AnalysisResult::column_names();
        let mut positions = Vec::with_capacity(columns.len());
        for column in &columns {
            let idx = match self.headers.iter().position(|h| h == column) {
                Some(idx) => idx,
                None => {
                    self.headers.push(column.clone());
                    for row in &mut self.rows {
                        row.push(String::new());
                    }
                    self.headers.len() - 1
                }
            };
            positions.push(idx);
        }

        for result in results {
            let mut row = vec![String::new(); self.headers.len()];
            for (idx, value) in positions.iter().zip(result.values()) {
                row[*idx] = value.to_string();
            }
            self.rows.push(row);
        }

        results.len()
    }
}

/// 永続化先の結果テーブル
pub struct ResultStore<'a, S: ObjectStore> {
    store: &'a S,
    key: String,
    /// 最後に読み書きしたときのバージョン。None はまだ存在しない
    version: Option<String>,
}

impl<'a, S: ObjectStore> ResultStore<'a, S> {
    /// 結果テーブルを読み込む
    ///
    /// オブジェクトが無ければ空テーブル。それ以外の読み込みエラーは呼び出し元へ返す
    /// （空テーブルで上書きして履歴を消さないため）。
    pub async fn load(
        store: &'a S,
        key: &str,
        metrics: &RequestMetrics,
    ) -> Result<(Self, ResultTable)> {
        let (version, table) = match store.get(key, metrics).await? {
            Some(object) => (Some(object.version), ResultTable::from_csv(&object.bytes)?),
            None => {
                info!(key, "結果テーブルが無いため新規作成");
                (None, ResultTable::new())
            }
        };

        debug!(key, rows = table.len(), version = ?version, "結果テーブルを読み込み");
        Ok((
            Self {
                store,
                key: key.to_string(),
                version,
            },
            table,
        ))
    }

    /// テーブル全体を書き込む
    pub async fn persist(&mut self, table: &ResultTable, metrics: &RequestMetrics) -> Result<()> {
        let bytes = table.to_csv()?;
        let precondition = match &self.version {
            Some(version) => Precondition::MatchVersion(version.clone()),
            None => Precondition::MustNotExist,
        };

        let version = self.store.put(&self.key, bytes, precondition, metrics).await?;
        debug!(key = %self.key, rows = table.len(), version = %version, "結果テーブルを保存");
        self.version = Some(version);
        Ok(())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}
