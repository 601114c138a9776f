//! Batch APIの入力マニフェスト（JSONL）

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// マニフェスト1行 = 1画像分のリクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 出力行との突き合わせキー（`<フォルダ>/<画像名>`）
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: Value,
}

impl ManifestEntry {
    pub fn post(custom_id: String, url: &str, body: Value) -> Self {
        Self {
            custom_id,
            method: "POST".to_string(),
            url: url.to_string(),
            body,
        }
    }
}

/// フォルダと画像名から custom_id を組み立てる
pub fn make_custom_id(source_group: &str, identifier: &str) -> String {
    let group = source_group.trim_matches('/');
    if group.is_empty() {
        identifier.to_string()
    } else {
        format!("{}/{}", group, identifier)
    }
}

/// マニフェストをJSONL文字列に変換
pub fn to_jsonl(entries: &[ManifestEntry]) -> Result<String> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}
