use crate::traits::{LoadWorker, WorkerStats};
use crate::utils::TASK_RESULT_TARGET;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

pub struct WorkerRunner;

impl WorkerRunner {
    /// Spawns every worker as a concurrent task and waits for all of them.
    ///
    /// Workers stop on Ctrl+C, when `duration` elapses, or when `token` is
    /// cancelled by the caller.
    pub async fn run_workers(
        workers: Vec<Arc<dyn LoadWorker>>,
        duration: Option<Duration>,
        token: CancellationToken,
    ) -> Result<WorkerStats> {
        let mut set = JoinSet::new();

        let ctrl_c_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!(
                            target: TASK_RESULT_TARGET,
                            "🛑 Received Ctrl+C. Initiating graceful shutdown..."
                        );
                        ctrl_c_token.cancel();
                    }
                    Err(err) => error!("Unable to listen for shutdown signal: {}", err),
                },
                _ = ctrl_c_token.cancelled() => {}
            }
        });

        if let Some(limit) = duration {
            let timer_token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        info!("Run duration of {:?} reached. Stopping workers...", limit);
                        timer_token.cancel();
                    }
                    _ = timer_token.cancelled() => {}
                }
            });
        }

        let start_time = std::time::Instant::now();
        info!("Starting {} load workers...", workers.len());

        for worker in workers {
            let id = worker.worker_id();
            let span = tracing::info_span!(target: TASK_RESULT_TARGET, "worker", worker_id = id);
            let child_token = token.clone();

            set.spawn(
                async move {
                    match worker.start(child_token).await {
                        Ok(stats) => Ok(stats),
                        Err(e) => {
                            error!("Worker {} failed: {:?}", id, e);
                            Err(e)
                        }
                    }
                }
                .instrument(span),
            );
        }

        let mut total = WorkerStats::default();

        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(stats)) => {
                    total.success += stats.success;
                    total.failed += stats.failed;
                    total.idle += stats.idle;
                }
                Ok(Err(_)) => {
                    // Already logged in the worker span
                }
                Err(e) => {
                    error!("A worker task panicked or failed to join: {:?}", e);
                }
            }
        }

        // Release the signal and timer listeners
        token.cancel();

        let total_duration = start_time.elapsed();
        let attempted = total.success + total.failed;
        let rate = if attempted > 0 {
            (total.success as f64 / attempted as f64) * 100.0
        } else {
            0.0
        };

        info!(target: TASK_RESULT_TARGET, "🛑 Shutdown Complete.");
        info!(
            target: TASK_RESULT_TARGET,
            "Total Time: {:.1}s | Total Success: {} | Total Fail: {} | Idle Ticks: {} | Success Rate: {:.2}%",
            total_duration.as_secs_f64(),
            total.success,
            total.failed,
            total.idle,
            rate
        );

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CountingWorker {
        id: usize,
    }

    #[async_trait]
    impl LoadWorker for CountingWorker {
        fn worker_id(&self) -> usize {
            self.id
        }

        async fn start(&self, token: CancellationToken) -> Result<WorkerStats> {
            let mut stats = WorkerStats::default();
            while !token.is_cancelled() {
                stats.success += 1;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Ok(stats)
        }
    }

    struct FailingWorker;

    #[async_trait]
    impl LoadWorker for FailingWorker {
        fn worker_id(&self) -> usize {
            99
        }

        async fn start(&self, _token: CancellationToken) -> Result<WorkerStats> {
            anyhow::bail!("wallet pool unavailable")
        }
    }

    #[tokio::test]
    async fn test_duration_stops_workers_and_sums_stats() {
        let workers: Vec<Arc<dyn LoadWorker>> = vec![
            Arc::new(CountingWorker { id: 0 }),
            Arc::new(CountingWorker { id: 1 }),
            Arc::new(FailingWorker),
        ];

        let stats = WorkerRunner::run_workers(
            workers,
            Some(Duration::from_millis(50)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(stats.success >= 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let workers: Vec<Arc<dyn LoadWorker>> = vec![Arc::new(CountingWorker { id: 0 })];
        let stats = WorkerRunner::run_workers(workers, None, token).await.unwrap();
        assert_eq!(stats.success, 0);
    }
}
