//! Photo Batch Common Library
//!
//! パイプライン本体とテストで共有される型とパーサー（I/Oなし）

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod manifest;

pub use types::{
    AnalysisResult, Composition, FieldValue, PersonDetail, SceneAttributes,
    FOLDER_COLUMN, IDENTIFIER_COLUMN, MAX_PERSONS,
};
pub use error::{Error, Result};
pub use parser::{
    decode_content, extract_json_object, parse_output_line, project_analysis, split_custom_id,
    LineOutcome,
};
pub use prompts::build_analysis_prompt;
pub use manifest::{make_custom_id, to_jsonl, ManifestEntry};
