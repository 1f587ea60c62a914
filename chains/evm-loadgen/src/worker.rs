//! Transfer task and worker loop
//!
//! [`TransferTask::execute`] is one invocation: pair, nonce, submit, record.
//! [`TransferWorker`] repeats it until cancelled, pacing itself with a random
//! wait or, while the distributor is pausing between cycles, the remaining
//! pause.

use crate::config::random_between;
use crate::distributor::WalletDistributor;
use crate::nonce_sequencer::NonceSequencer;
use anyhow::Result;
use async_trait::async_trait;
use core_logic::{
    LoadWorker, MetricsCollector, TASK_RESULT_TARGET, TransactionLogBuffer, TransactionLogEntry,
    TransactionSubmitter, TransferRequest, WorkerStats,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of one task invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Sent { tx_hash: String, nonce: u64 },
    Failed { nonce: Option<u64>, error: String },
    /// No wallet available this tick
    Idle,
}

/// Shared dependencies for a single transfer
pub struct TransferTask {
    distributor: Arc<WalletDistributor>,
    sequencer: Arc<NonceSequencer>,
    submitter: Arc<dyn TransactionSubmitter>,
    log: Arc<TransactionLogBuffer>,
    metrics: Arc<MetricsCollector>,
}

impl TransferTask {
    pub fn new(
        distributor: Arc<WalletDistributor>,
        sequencer: Arc<NonceSequencer>,
        submitter: Arc<dyn TransactionSubmitter>,
        log: Arc<TransactionLogBuffer>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            distributor,
            sequencer,
            submitter,
            log,
            metrics,
        }
    }

    pub fn distributor(&self) -> &Arc<WalletDistributor> {
        &self.distributor
    }

    /// Performs one transfer for `worker_id`.
    ///
    /// Per-request failures are recorded and returned as
    /// [`TaskOutcome::Failed`]; they never abort the caller.
    pub async fn execute(&self, worker_id: usize) -> TaskOutcome {
        let started = Instant::now();

        let pair = match self.distributor.next_pair(worker_id) {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                self.metrics.record_idle();
                return TaskOutcome::Idle;
            }
            Err(e) => {
                error!("Worker {} cannot draw a wallet pair: {}", worker_id, e);
                return TaskOutcome::Failed {
                    nonce: None,
                    error: e.to_string(),
                };
            }
        };

        let sender = pair.sender.checksum_address();
        let address = pair.sender.address;

        let nonce = match self.sequencer.next(address).await {
            Ok(nonce) => nonce,
            Err(e) => {
                let message = format!("{:#}", e);
                self.sequencer.reset(address).await;
                self.finish_failed(sender, started.elapsed(), None, worker_id, message.clone())
                    .await;
                return TaskOutcome::Failed {
                    nonce: None,
                    error: message,
                };
            }
        };

        let request = TransferRequest {
            sender: pair.sender,
            receiver: pair.receiver.address,
            nonce,
        };

        match self.submitter.submit(&request).await {
            Ok(tx_hash) => {
                self.sequencer.update(address, nonce + 1).await;

                let elapsed = started.elapsed();
                self.metrics.record_transfer(elapsed, true);
                info!(
                    target: TASK_RESULT_TARGET,
                    "Status: Success | {} -> {} | Nonce: {} | Hash: {} | {:.2}s",
                    sender,
                    pair.receiver.checksum_address(),
                    nonce,
                    tx_hash,
                    elapsed.as_secs_f64()
                );
                self.record(TransactionLogEntry::success(
                    sender,
                    tx_hash.clone(),
                    elapsed,
                    nonce,
                    worker_id,
                ))
                .await;

                TaskOutcome::Sent { tx_hash, nonce }
            }
            Err(e) => {
                self.sequencer.reset(address).await;
                if e.is_nonce_conflict() {
                    warn!("Nonce {} rejected for {}; resyncing with the node", nonce, sender);
                }

                let message = e.to_string();
                self.finish_failed(
                    sender,
                    started.elapsed(),
                    Some(nonce),
                    worker_id,
                    message.clone(),
                )
                .await;

                TaskOutcome::Failed {
                    nonce: Some(nonce),
                    error: message,
                }
            }
        }
    }

    async fn finish_failed(
        &self,
        sender: String,
        elapsed: Duration,
        nonce: Option<u64>,
        worker_id: usize,
        message: String,
    ) {
        self.metrics.record_transfer(elapsed, false);
        info!(
            target: TASK_RESULT_TARGET,
            "Status: Failed | {} | Nonce: {} | {:.2}s | {}",
            sender,
            nonce.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string()),
            elapsed.as_secs_f64(),
            message
        );
        self.record(TransactionLogEntry::failure(
            sender, elapsed, nonce, worker_id, message,
        ))
        .await;
    }

    async fn record(&self, entry: TransactionLogEntry) {
        if let Err(e) = self.log.record(entry).await {
            warn!("Failed to persist transaction records: {:#}", e);
        }
    }
}

/// Long-running worker that drives [`TransferTask`] until cancelled
pub struct TransferWorker {
    id: usize,
    task: Arc<TransferTask>,
    wait_min: Duration,
    wait_max: Duration,
}

impl TransferWorker {
    pub fn new(id: usize, task: Arc<TransferTask>, wait_min: Duration, wait_max: Duration) -> Self {
        Self {
            id,
            task,
            wait_min,
            wait_max,
        }
    }

    fn next_wait(&self, outcome: &TaskOutcome) -> Duration {
        match outcome {
            TaskOutcome::Idle => self
                .task
                .distributor()
                .pause_remaining()
                .unwrap_or_else(|| random_between(self.wait_min, self.wait_max)),
            _ => random_between(self.wait_min, self.wait_max),
        }
    }
}

#[async_trait]
impl LoadWorker for TransferWorker {
    fn worker_id(&self) -> usize {
        self.id
    }

    async fn start(&self, cancellation_token: CancellationToken) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();

        while !cancellation_token.is_cancelled() {
            let outcome = self.task.execute(self.id).await;
            match &outcome {
                TaskOutcome::Sent { .. } => stats.success += 1,
                TaskOutcome::Failed { .. } => stats.failed += 1,
                TaskOutcome::Idle => stats.idle += 1,
            }

            let wait = self.next_wait(&outcome);
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(stats)
    }
}
