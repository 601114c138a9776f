//! 固定サイズのチャンク分割

use crate::config::MAX_BATCH_SIZE;

/// 順序を保ったまま batch_size 件ずつに分ける（最後だけ短くなりうる）
///
/// batch_size は 1..=MAX_BATCH_SIZE に丸める。
pub fn plan_chunks<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.clamp(1, MAX_BATCH_SIZE)).collect()
}
