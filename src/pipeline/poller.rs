//! ジョブ完了待ち
//!
//! 一定間隔で状態を問い合わせ、終了状態になったら返す。
//! タイムアウトと中断シグナルで待機を打ち切れる。

use crate::error::{BatchError, Result};
use crate::service::{BatchJob, BatchService};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// None なら終了状態まで待ち続ける
    pub timeout: Option<Duration>,
}

/// 終了状態になるまで状態を問い合わせる
///
/// - 中断シグナル → `BatchError::Cancelled`
/// - タイムアウト → `BatchError::PollTimeout`（ジョブはサービス側に残る）
/// - 状態取得の失敗 → そのまま返す
pub async fn wait_for_terminal<S: BatchService>(
    service: &S,
    job_id: &str,
    options: PollOptions,
    cancel: &mut watch::Receiver<bool>,
) -> Result<BatchJob> {
    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);

    loop {
        if *cancel.borrow() {
            return Err(BatchError::Cancelled);
        }

        let job = service.status(job_id).await?;
        debug!(job_id, status = %job.status, "ジョブ状態");
        if job.status.is_terminal() {
            return Ok(job);
        }

        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(BatchError::PollTimeout {
                        job_id: job_id.to_string(),
                        waited_secs: (now - started).as_secs(),
                    });
                }
                options.interval.min(deadline - now)
            }
            None => options.interval,
        };

        if sleep_unless_cancelled(wait, cancel).await {
            return Err(BatchError::Cancelled);
        }
    }
}

/// wait だけ待つ。途中で中断されたら true
async fn sleep_unless_cancelled(wait: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    let signalled = tokio::select! {
        _ = tokio::time::sleep(wait) => return false,
        res = cancel.wait_for(|cancelled| *cancelled) => res.is_ok(),
    };

    if !signalled {
        // 送信側が無くなったのでもう中断されない
        tokio::time::sleep(wait).await;
    }
    signalled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::JobStatus;
    use photo_batch_common::ManifestEntry;
    use std::sync::Mutex;

    /// 決められた順に状態を返すサービス
    struct SequenceService {
        statuses: Mutex<Vec<JobStatus>>,
        queries: Mutex<usize>,
    }

    impl SequenceService {
        fn new(statuses: &[JobStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.to_vec()),
                queries: Mutex::new(0),
            }
        }

        fn queries(&self) -> usize {
            *self.queries.lock().unwrap()
        }
    }

    impl BatchService for SequenceService {
        async fn submit(&self, _entries: &[ManifestEntry]) -> Result<BatchJob> {
            unreachable!()
        }

        async fn status(&self, job_id: &str) -> Result<BatchJob> {
            *self.queries.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0]
            };
            Ok(BatchJob {
                job_id: job_id.to_string(),
                status,
                output_handle: (status == JobStatus::Completed).then(|| "file-out".to_string()),
            })
        }

        async fn fetch_output(&self, _handle: &str) -> Result<String> {
            unreachable!()
        }

        async fn cancel(&self, _job_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fast(timeout: Option<Duration>) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(1),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_stops_on_completed() {
        let service = SequenceService::new(&[
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
        ]);
        let (_tx, mut rx) = watch::channel(false);

        let job = wait_for_terminal(&service, "batch_1", fast(None), &mut rx)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_handle.as_deref(), Some("file-out"));
        assert_eq!(service.queries(), 3);
    }

    #[tokio::test]
    async fn test_stops_on_failed() {
        let service = SequenceService::new(&[JobStatus::Pending, JobStatus::Failed]);
        let (_tx, mut rx) = watch::channel(false);

        let job = wait_for_terminal(&service, "batch_1", fast(None), &mut rx)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(service.queries(), 2);
    }

    #[tokio::test]
    async fn test_timeout() {
        let service = SequenceService::new(&[JobStatus::Running]);
        let (_tx, mut rx) = watch::channel(false);

        let err = wait_for_terminal(
            &service,
            "batch_1",
            fast(Some(Duration::from_millis(20))),
            &mut rx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BatchError::PollTimeout { ref job_id, .. } if job_id == "batch_1"));
        assert!(service.queries() >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_query() {
        let service = SequenceService::new(&[JobStatus::Completed]);
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = wait_for_terminal(&service, "batch_1", fast(None), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(service.queries(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let service = SequenceService::new(&[JobStatus::Running]);
        let (tx, mut rx) = watch::channel(false);
        let options = PollOptions {
            interval: Duration::from_secs(3600),
            timeout: None,
        };

        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
        });

        let err = wait_for_terminal(&service, "batch_1", options, &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(service.queries(), 1);
        cancel.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_keeps_polling() {
        let service = SequenceService::new(&[JobStatus::Running, JobStatus::Completed]);
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        let job = wait_for_terminal(&service, "batch_1", fast(None), &mut rx)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}
