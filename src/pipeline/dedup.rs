//! 処理済み画像の除外

use super::ImageRecord;
use crate::store::ProcessedIndex;

/// 処理済みの画像を除外する
///
/// 戻り値: (未処理の画像, スキップした枚数)。順序は入力のまま。
pub fn filter_processed(
    images: Vec<ImageRecord>,
    index: &ProcessedIndex,
) -> (Vec<ImageRecord>, usize) {
    let total = images.len();
    let pending: Vec<ImageRecord> = images
        .into_iter()
        .filter(|img| !index.contains(&img.identifier))
        .collect();
    let skipped = total - pending.len();
    (pending, skipped)
}
