//! 解析結果の型定義
//!
//! - FieldValue: 欠損を明示する値（欠損はCSVで空セル）
//! - SceneAttributes / Composition / PersonDetail: AI応答のJSONを寛容に受ける型
//! - AnalysisResult: 結果テーブル1行分の固定幅レコード

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 1画像あたりに保持する人物の最大数
pub const MAX_PERSONS: usize = 5;

/// 解析フィールドの値
///
/// AIの応答は型が揺れる（数値・文字列・真偽値・null）ため、
/// どの型でも受け取り文字列として保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    /// キーなし、または null
    #[default]
    Absent,
    Present(String),
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Absent,
            Value::String(s) => FieldValue::Present(s.clone()),
            Value::Number(n) => FieldValue::Present(n.to_string()),
            Value::Bool(b) => FieldValue::Present(b.to_string()),
            // 配列・オブジェクトはコンパクトJSONのまま残す
            other => FieldValue::Present(other.to_string()),
        }
    }

    /// CSVセル用の文字列（欠損は空文字）
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Absent => "",
            FieldValue::Present(s) => s,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Present(s.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(&value))
    }
}

/// オブジェクト以外（文字列・配列など）が来たら既定値にする
fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(object_or_default(value))
}

pub(crate) fn object_or_default<T>(value: Value) -> T
where
    T: DeserializeOwned + Default,
{
    if value.is_object() {
        T::deserialize(value).unwrap_or_default()
    } else {
        T::default()
    }
}

/// 構図
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Composition {
    pub balanced: FieldValue,
    pub leading_lines: FieldValue,
    pub framing: FieldValue,
    pub negative_space: FieldValue,
    pub focal_point: FieldValue,
}

/// 写真全体の属性
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneAttributes {
    pub people_count: FieldValue,
    pub faces_count: FieldValue,
    pub is_selfie: FieldValue,
    pub is_ads: FieldValue,
    pub filter_or_editing_level: FieldValue,
    pub description: FieldValue,
    pub category: FieldValue,
    pub category_alt: FieldValue,
    pub photo_mood: FieldValue,
    pub lighting: FieldValue,
    pub blur_level: FieldValue,
    pub depth_of_field: FieldValue,
    pub color_palette: FieldValue,
    pub facial_expressions_intensity: FieldValue,
    pub interaction_type: FieldValue,
    pub cultural_elements: FieldValue,
    pub interior_vs_exterior: FieldValue,
    pub expression_authenticity: FieldValue,
    pub status_symbols_present: FieldValue,
    pub lifestyle: FieldValue,
    pub background: FieldValue,
    #[serde(deserialize_with = "lenient_object")]
    pub composition: Composition,
}

/// 写っている人物1人分の属性
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PersonDetail {
    pub gender: FieldValue,
    pub makeup_level: FieldValue,
    pub smiling: FieldValue,
    pub stylish_clothes_level: FieldValue,
    pub brand_logos: FieldValue,
    pub expensive_clothes_level: FieldValue,
    pub provocativeness_level: FieldValue,
    pub neatness_level: FieldValue,
    #[serde(rename = "physical_attractiveness_level")]
    pub attractiveness_level: FieldValue,
    pub wearing_glasses: FieldValue,
    pub dominant_emotion: FieldValue,
    pub posing_level: FieldValue,
    pub tattoos: FieldValue,
    pub piercing: FieldValue,
    pub flashy_clothing: FieldValue,
    pub appearance_style: FieldValue,
    pub nudity: FieldValue,
    pub pose: FieldValue,
}

/// 写真全体の列名（CSVの列順）
pub const SCENE_COLUMNS: [&str; 26] = [
    "people_count",
    "faces_count",
    "is_selfie",
    "is_ads",
    "filter_or_editing_level",
    "description",
    "category",
    "category_alt",
    "photo_mood",
    "lighting",
    "blur_level",
    "depth_of_field",
    "color_palette",
    "facial_expressions_intensity",
    "interaction_type",
    "cultural_elements",
    "interior_vs_exterior",
    "expression_authenticity",
    "status_symbols_present",
    "lifestyle",
    "background",
    "composition_balanced",
    "composition_leading_lines",
    "composition_framing",
    "composition_negative_space",
    "composition_focal_point",
];

/// 人物属性の列名サフィックス（`Person{n}_{suffix}`）
pub const PERSON_ATTRIBUTES: [&str; 18] = [
    "Gender",
    "MakeupLevel",
    "Smiling",
    "StylishClothesLevel",
    "BrandLogos",
    "ExpensiveClothesLevel",
    "ProvocativenessLevel",
    "NeatnessLevel",
    "AttractivenessLevel",
    "WearingGlasses",
    "DominantEmotion",
    "PosingLevel",
    "Tattoos",
    "Piercing",
    "FlashyClothing",
    "AppearanceStyle",
    "Nudity",
    "Pose",
];

/// フォルダ名の列（結果テーブル）
pub const FOLDER_COLUMN: &str = "folder_name";

/// 画像名の列。処理済み判定のキーになる
pub const IDENTIFIER_COLUMN: &str = "image_name";

impl SceneAttributes {
    fn values(&self) -> [&FieldValue; 26] {
        let c = &self.composition;
        [
            &self.people_count,
            &self.faces_count,
            &self.is_selfie,
            &self.is_ads,
            &self.filter_or_editing_level,
            &self.description,
            &self.category,
            &self.category_alt,
            &self.photo_mood,
            &self.lighting,
            &self.blur_level,
            &self.depth_of_field,
            &self.color_palette,
            &self.facial_expressions_intensity,
            &self.interaction_type,
            &self.cultural_elements,
            &self.interior_vs_exterior,
            &self.expression_authenticity,
            &self.status_symbols_present,
            &self.lifestyle,
            &self.background,
            &c.balanced,
            &c.leading_lines,
            &c.framing,
            &c.negative_space,
            &c.focal_point,
        ]
    }
}

impl PersonDetail {
    /// JSON配列の1要素から寛容に変換
    ///
    /// 文字列で来た場合はJSONとして再デコードを試み、
    /// それ以外の型は全項目欠損の人物になる。
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(_) => object_or_default(value.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map(object_or_default)
                .unwrap_or_default(),
            _ => Self::default(),
        }
    }

    fn values(&self) -> [&FieldValue; 18] {
        [
            &self.gender,
            &self.makeup_level,
            &self.smiling,
            &self.stylish_clothes_level,
            &self.brand_logos,
            &self.expensive_clothes_level,
            &self.provocativeness_level,
            &self.neatness_level,
            &self.attractiveness_level,
            &self.wearing_glasses,
            &self.dominant_emotion,
            &self.posing_level,
            &self.tattoos,
            &self.piercing,
            &self.flashy_clothing,
            &self.appearance_style,
            &self.nudity,
            &self.pose,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|v| v.is_absent())
    }
}

/// 解析結果（結果テーブルの1行）
///
/// 人物は常に `MAX_PERSONS` 人分を持ち、列数は応答内容によらず一定。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub folder_name: String,
    pub image_name: String,
    pub scene: SceneAttributes,
    pub persons: [PersonDetail; MAX_PERSONS],
}

impl AnalysisResult {
    /// 全列名（CSVヘッダー順）
    pub fn column_names() -> Vec<String> {
        let mut names = Vec::with_capacity(Self::column_count());
        names.push(FOLDER_COLUMN.to_string());
        names.push(IDENTIFIER_COLUMN.to_string());
        names.extend(SCENE_COLUMNS.iter().map(|c| c.to_string()));
        for i in 1..=MAX_PERSONS {
            names.extend(PERSON_ATTRIBUTES.iter().map(|a| format!("Person{}_{}", i, a)));
        }
        names
    }

    pub fn column_count() -> usize {
        2 + SCENE_COLUMNS.len() + MAX_PERSONS * PERSON_ATTRIBUTES.len()
    }

    /// 列名と同じ順序のセル値
    pub fn values(&self) -> Vec<&str> {
        let mut cells = Vec::with_capacity(Self::column_count());
        cells.push(self.folder_name.as_str());
        cells.push(self.image_name.as_str());
        cells.extend(self.scene.values().iter().map(|v| v.as_str()));
        for person in &self.persons {
            cells.extend(person.values().iter().map(|v| v.as_str()));
        }
        cells
    }
}
