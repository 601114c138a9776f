//! Batch APIの出力パーサー
//!
//! 出力JSONLの1行を解釈し、応答本文のJSONを取り出して
//! 固定幅の AnalysisResult に射影する。I/Oは持たない。

use crate::error::{Error, Result};
use crate::types::{AnalysisResult, PersonDetail, SceneAttributes, MAX_PERSONS};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

lazy_static! {
    static ref CODE_FENCE_RE: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").unwrap();
}

/// 出力1行の解釈結果
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// 解析結果として取り込める行
    Parsed(AnalysisResult),
    /// リクエスト自体が完了していない行（次回実行で再投入される）
    Incomplete { custom_id: String, status: String },
    /// 応答本文が解析スキーマとして読めない行
    DecodeFailed { custom_id: String, reason: String },
}

/// 応答本文からJSONオブジェクト部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...}
/// 3. エラー
///
/// # Examples
/// ```
/// use photo_batch_common::extract_json_object;
///
/// let content = "```json\n{\"people_count\": 1}\n```";
/// assert_eq!(extract_json_object(content).unwrap(), "{\"people_count\": 1}");
/// ```
pub fn extract_json_object(content: &str) -> Result<&str> {
    if let Some(caps) = CODE_FENCE_RE.captures(content) {
        if let Some(inner) = caps.get(1) {
            return Ok(inner.as_str());
        }
    }

    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if end > start {
                return Ok(&content[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONオブジェクトが見つかりません".into()))
}

/// 応答本文をJSONオブジェクトとしてデコード
pub fn decode_content(content: &str) -> Result<Value> {
    let json_str = extract_json_object(content)?;
    let value: Value = serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("JSONデコードエラー: {}", e)))?;
    if !value.is_object() {
        return Err(Error::Parse("JSONがオブジェクトではありません".into()));
    }
    Ok(value)
}

/// custom_id を (フォルダ, 画像名) に分割
///
/// custom_id は `<フォルダ>/<画像名>` 形式。区切りがなければ全体を画像名とみなす。
pub fn split_custom_id(custom_id: &str) -> (&str, &str) {
    match custom_id.rsplit_once('/') {
        Some((folder, image)) => (folder, image),
        None => ("", custom_id),
    }
}

/// デコード済み本文を固定幅の解析結果に射影
///
/// - 欠けているキーは欠損値
/// - person_details が配列でなければ人物なし
/// - 6人目以降は捨て、5人に満たない分は空の人物で埋める
pub fn project_analysis(custom_id: &str, content: &Value) -> Result<AnalysisResult> {
    let object = content
        .as_object()
        .ok_or_else(|| Error::Parse("JSONがオブジェクトではありません".into()))?;

    let scene = SceneAttributes::deserialize(content)
        .map_err(|e| Error::Parse(format!("属性の変換に失敗: {}", e)))?;

    let mut persons: [PersonDetail; MAX_PERSONS] = Default::default();
    if let Some(Value::Array(entries)) = object.get("person_details") {
        for (slot, entry) in persons.iter_mut().zip(entries.iter()) {
            *slot = PersonDetail::from_json(entry);
        }
    }

    let (folder, image) = split_custom_id(custom_id);
    Ok(AnalysisResult {
        folder_name: folder.to_string(),
        image_name: image.to_string(),
        scene,
        persons,
    })
}

/// Batch API出力JSONLの1行を解釈
pub fn parse_output_line(line: &str) -> LineOutcome {
    let data: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return LineOutcome::DecodeFailed {
                custom_id: String::new(),
                reason: format!("出力行のJSONが不正: {}", e),
            }
        }
    };

    let custom_id = data
        .get("custom_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // status が無い、または completed の行のみ対象
    match data.get("status") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s == "completed" => {}
        Some(other) => {
            let status = other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string());
            return LineOutcome::Incomplete { custom_id, status };
        }
    }

    if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
        let status = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("error")
            .to_string();
        return LineOutcome::Incomplete { custom_id, status };
    }

    let response = &data["response"];
    if let Some(code) = response.get("status_code").and_then(Value::as_u64) {
        if code >= 400 {
            return LineOutcome::Incomplete {
                custom_id,
                status: format!("http {}", code),
            };
        }
    }

    if custom_id.is_empty() {
        return LineOutcome::DecodeFailed {
            custom_id,
            reason: "custom_id がありません".into(),
        };
    }

    let Some(content) = response["body"]["choices"][0]["message"]["content"].as_str() else {
        return LineOutcome::DecodeFailed {
            custom_id,
            reason: "応答本文(content)がありません".into(),
        };
    };

    match decode_content(content).and_then(|value| project_analysis(&custom_id, &value)) {
        Ok(result) => LineOutcome::Parsed(result),
        Err(e) => LineOutcome::DecodeFailed {
            custom_id,
            reason: e.to_string(),
        },
    }
}
