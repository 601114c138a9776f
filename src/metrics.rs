//! ストレージ呼び出し回数の集計
//!
//! 呼び出し側が `RequestMetrics` を作り、ストレージの各メソッドに渡す。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// オブジェクトストレージへのリクエスト数
#[derive(Debug, Default)]
pub struct RequestMetrics {
    pub list: Counter,
    pub download: Counter,
    pub upload: Counter,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        RequestMetricsSnapshot {
            list: self.list.get(),
            download: self.download.get(),
            upload: self.upload.get(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMetricsSnapshot {
    pub list: u64,
    pub download: u64,
    pub upload: u64,
}

impl RequestMetricsSnapshot {
    pub fn total(&self) -> u64 {
        self.list + self.download + self.upload
    }
}

impl fmt::Display for RequestMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "list={}, download={}, upload={}",
            self.list, self.download, self.upload
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = RequestMetrics::new();
        metrics.list.inc();
        metrics.download.inc_by(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.list, 1);
        assert_eq!(snap.download, 3);
        assert_eq!(snap.upload, 0);
        assert_eq!(snap.total(), 4);
        assert_eq!(snap.to_string(), "list=1, download=3, upload=0");
    }
}
