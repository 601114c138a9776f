//! プロンプト生成モジュール
//!
//! 画像1枚ごとに送る解析プロンプト。応答JSONのキーは
//! `types::SceneAttributes` / `types::PersonDetail` と対応する。

/// カテゴリ候補
pub const CATEGORIES: &[&str] = &[
    "socializing",
    "romantic picture",
    "unique location",
    "supporting cause",
    "face shot",
    "special occasion",
    "alone posing",
    "playing sports",
    "family",
    "interests",
    "humorous shot",
];

/// 解析プロンプト生成
///
/// 応答は説明文なしの厳密なJSONオブジェクトのみを要求する。
pub fn build_analysis_prompt() -> String {
    let categories = CATEGORIES.join(", ");

    format!(
        r#"Please analyze this image based on the following criteria and return exactly a valid JSON object without any markdown formatting, code fences, or additional text.

{{
  "people_count": <number>,
  "faces_count": <number>,
  "person_details": [
    {{
      "gender": "<male/female/unknown>",
      "makeup_level": <0-5>,
      "smiling": "<yes/no>",
      "stylish_clothes_level": <0-5>,
      "brand_logos": "<yes/no>",
      "expensive_clothes_level": <0-5>,
      "provocativeness_level": <-3 to 3>,
      "neatness_level": <0-5>,
      "physical_attractiveness_level": <-3 to 3>,
      "wearing_glasses": "<yes/no>",
      "dominant_emotion": "<anger/contempt/disgust/fear/happiness/neutral/sadness/surprise>",
      "posing_level": <0-5>,
      "tattoos": "<yes/no>",
      "piercing": "<yes/no>",
      "flashy_clothing": "<yes/no>",
      "appearance_style": "<urban/sporty/business/evening/casual/streetwear/grunge/hipster/punk/goth/military/retro/minimalist/classic/luxury>",
      "nudity": <0-5>,
      "pose": "<dominant/confident/aggressive/relaxed/posing_formal/flirtatious/vulnerable/defensive/natural/playful/assertive>"
    }}
  ],
  "is_selfie": "<yes/no>",
  "is_ads": "<yes/no>",
  "filter_or_editing_level": <0-5>,
  "description": "<string>",
  "category": "<one of: {categories}>",
  "category_alt": "<one of: socializing, romantic, travel, special_event, selfie, portrait, sports, family, pets, fashion, food, artistic, funny, meme, cause_support, hobby, work_related, product_promo, intimate, mirror_photo, group_photo, minimalist_aesthetic, luxury_lifestyle>",
  "photo_mood": "<cheerful/serious/dramatic/romantic/anxious/mysterious/aggressive/dynamic/calm>",
  "lighting": "<natural/artificial/mixed/contrasty/diffused/low-key/high-key>",
  "blur_level": <0-5>,
  "depth_of_field": "<shallow/deep>",
  "color_palette": "<monochrome/warm/cold/pastel/acidic/contrasting/neutral>",
  "interior_vs_exterior": "<indoor/outdoor/hard to tell>",
  "expression_authenticity": <0-5>,
  "status_symbols_present": "<yes/no>",
  "lifestyle": "<one of: productivity, sports, travel, fitness, party, career, education, culture, romantic, pet_life, luxury_lifestyle, family_oriented, creative_artistic, activist_or_cause, influencer_style, daily_life, adventurous, spiritual, laziness>",
  "background": "<one of: home_private, home_decorated, messy_home, nature, urban_city, party_scene, cultural_place, gym_or_sports_area, workspace, educational_place, luxury_location, vehicle_or_transport, mirror_selfie, minimalist, cluttered_or_noisy, unclear_or_generic, studio_or_staged>",
  "facial_expressions_intensity": <0-5>,
  "interaction_type": "<hugging/handshake/eye contact/talking/no interaction/dancing/sharing an object/laughing together/running together/posing together/other>",
  "cultural_elements": "<yes/no>",
  "composition": {{
    "balanced": "<yes/no>",
    "leading_lines": "<yes/no>",
    "framing": "<yes/no>",
    "negative_space": "<yes/no>",
    "focal_point": "<string>"
  }}
}}
Return the result as strict JSON only. Do not include any commentary, explanation, or markdown formatting. All keys and values must be enclosed in double quotes. Use commas to separate all elements. Do not include trailing commas."#
    )
}
