//! 画像1枚分のリクエスト本文の組み立て
//!
//! パイプラインからは `PayloadBuilder` としてしか見えない。
//! 画像が読めない場合はエラーを返し、その画像はマニフェストから外される。

use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::pipeline::ImageRecord;
use base64::{engine::general_purpose, Engine};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use photo_batch_common::build_analysis_prompt;
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::Path;

pub trait PayloadBuilder {
    fn build(&self, image: &ImageRecord) -> Result<Value>;
}

/// Chat Completions 形式の画像解析リクエスト
#[derive(Debug, Clone)]
pub struct VisionPayloadBuilder {
    model: String,
    max_tokens: u32,
    max_image_size: u32,
    prompt: String,
}

impl VisionPayloadBuilder {
    pub fn new(model: &str, max_tokens: u32, max_image_size: u32) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            max_image_size,
            prompt: build_analysis_prompt(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.model, config.max_tokens, config.max_image_size)
    }
}

impl PayloadBuilder for VisionPayloadBuilder {
    fn build(&self, image: &ImageRecord) -> Result<Value> {
        let encoded = encode_image(&image.local_path, self.max_image_size)?;

        Ok(json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": self.prompt},
                        {"type": "image_url", "image_url": {"url": format!("data:image/jpeg;base64,{}", encoded)}}
                    ]
                }
            ],
            "max_tokens": self.max_tokens,
        }))
    }
}

/// 画像を読み込み、長辺を max_size に収めてJPEGのBase64にする
pub fn encode_image(path: &Path, max_size: u32) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| BatchError::ImageLoad(format!("{}: {}", path.display(), e)))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| BatchError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    let img = if max_size > 0 && (img.width() > max_size || img.height() > max_size) {
        img.resize(max_size, max_size, FilterType::Triangle)
    } else {
        img
    };

    // JPEGはアルファ非対応
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| BatchError::ImageLoad(format!("{}: JPEG変換失敗: {}", path.display(), e)))?;

    Ok(general_purpose::STANDARD.encode(buffer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use tempfile::tempdir;

    fn record(path: &Path) -> ImageRecord {
        ImageRecord {
            source_group: "ig_pics/alice/".to_string(),
            local_path: path.to_path_buf(),
            identifier: "a.png".to_string(),
        }
    }

    #[test]
    fn test_build_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.png");
        ImageBuffer::from_pixel(8, 8, Rgba([10u8, 20, 30, 255])).save(&path).unwrap();

        let builder = VisionPayloadBuilder::new("gpt-4o-mini", 800, 1568);
        let body = builder.build(&record(&path)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 800);
        let url = body["messages"][0]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let text = body["messages"][0]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("person_details"));
    }

    #[test]
    fn test_encode_image_resizes_long_side() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        ImageBuffer::from_pixel(40, 20, Rgba([0u8, 0, 0, 255])).save(&path).unwrap();

        let encoded = encode_image(&path, 10).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (10, 5));
    }

    #[test]
    fn test_unreadable_image_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let builder = VisionPayloadBuilder::new("m", 10, 100);
        let err = builder.build(&record(&path)).unwrap_err();
        assert!(matches!(err, BatchError::ImageLoad(_)));
    }

    #[test]
    fn test_missing_file_is_error() {
        let builder = VisionPayloadBuilder::new("m", 10, 100);
        let err = builder
            .build(&record(Path::new("/nonexistent/photo.jpg")))
            .unwrap_err();
        assert!(matches!(err, BatchError::ImageLoad(_)));
    }
}
