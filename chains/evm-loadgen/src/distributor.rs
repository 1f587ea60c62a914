//! # Wallet Distributor
//!
//! Hands out `(sender, receiver)` wallet pairs to concurrent workers.
//!
//! Each worker owns a contiguous slice of the sender pool, computed by
//! [`core_logic::partition_range`]. Within one cycle every sender in that
//! slice is handed out exactly once, in index order. Receivers rotate
//! round-robin from a single shared counter.
//!
//! When a worker runs out of senders it gets `None` until *every* worker has
//! exhausted its slice. The caller that observes this resets all cursors,
//! starts the configured pause and (with no pause) is served from the fresh
//! cycle straight away.
//!
//! ## Example
//!
//! ```rust,ignore
//! let distributor = WalletDistributor::new(senders, receivers, 4, Duration::from_secs(3))?;
//! match distributor.next_pair(worker_id)? {
//!     Some(pair) => submit(pair).await,
//!     None => sleep(distributor.pause_remaining().unwrap_or(poll)).await,
//! }
//! ```

use core_logic::{DistributionError, MetricsCollector, Wallet, WalletPool, partition_range};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One sender/receiver pair for a single transfer
#[derive(Debug, Clone)]
pub struct WalletPair {
    pub sender_index: usize,
    pub receiver_index: usize,
    pub sender: Wallet,
    pub receiver: Wallet,
}

/// A worker's cursor into its slice of the sender pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub worker_id: usize,
    pub start: usize,
    /// Exclusive
    pub end: usize,
    pub current: usize,
    pub initial_range: Range<usize>,
}

impl WorkerAssignment {
    fn new(worker_id: usize, range: Range<usize>) -> Self {
        Self {
            worker_id,
            start: range.start,
            end: range.end,
            current: range.start,
            initial_range: range,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.current >= self.end
    }

    fn rewind(&mut self) {
        self.start = self.initial_range.start;
        self.end = self.initial_range.end;
        self.current = self.initial_range.start;
    }
}

#[derive(Debug, Default)]
struct DistributorState {
    assignments: HashMap<usize, WorkerAssignment>,
    receiver_cursor: usize,
    cycle_count: u64,
    resume_at: Option<Instant>,
}

pub struct WalletDistributor {
    senders: WalletPool,
    receivers: WalletPool,
    workers: usize,
    cycle_delay: Duration,
    state: Mutex<DistributorState>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl WalletDistributor {
    /// Creates a distributor for `workers` workers.
    ///
    /// Fails fast when either pool is empty or `workers` is zero.
    pub fn new(
        senders: WalletPool,
        receivers: WalletPool,
        workers: usize,
        cycle_delay: Duration,
    ) -> Result<Self, DistributionError> {
        if workers == 0 {
            return Err(DistributionError::NoWorkers);
        }
        for pool in [&senders, &receivers] {
            if pool.is_empty() {
                return Err(DistributionError::EmptyPool {
                    role: pool.role().to_string(),
                });
            }
        }

        Ok(Self {
            senders,
            receivers,
            workers,
            cycle_delay,
            state: Mutex::new(DistributorState::default()),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Next wallet pair for `worker_id`, or `None` when the worker has no
    /// work this tick.
    ///
    /// `None` means either the worker's slice is spent while others are still
    /// busy, or the inter-cycle pause is running. Neither is an error.
    pub fn next_pair(&self, worker_id: usize) -> Result<Option<WalletPair>, DistributionError> {
        if worker_id >= self.workers {
            return Err(DistributionError::WorkerOutOfRange {
                worker_id,
                workers: self.workers,
            });
        }

        let mut state = self.state.lock();

        if let Some(resume_at) = state.resume_at {
            if Instant::now() < resume_at {
                return Ok(None);
            }
            state.resume_at = None;
        }

        if !state.assignments.contains_key(&worker_id) {
            let range = partition_range(self.senders.len(), self.workers, worker_id)?;
            debug!(
                "Worker {} assigned senders [{}, {})",
                worker_id, range.start, range.end
            );
            state
                .assignments
                .insert(worker_id, WorkerAssignment::new(worker_id, range));
        }

        let exhausted = state
            .assignments
            .get(&worker_id)
            .is_none_or(WorkerAssignment::is_exhausted);

        if exhausted {
            if !self.all_exhausted(&state) {
                return Ok(None);
            }

            self.start_new_cycle(&mut state);

            if !self.cycle_delay.is_zero() {
                state.resume_at = Some(Instant::now() + self.cycle_delay);
                return Ok(None);
            }
        }

        Ok(self.serve(&mut state, worker_id))
    }

    /// Time left on the inter-cycle pause, if one is running
    pub fn pause_remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        state
            .resume_at
            .map(|at| at.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Number of completed cycles
    pub fn cycle_count(&self) -> u64 {
        self.state.lock().cycle_count
    }

    /// Snapshot of a worker's cursor, if it has made a request
    pub fn assignment(&self, worker_id: usize) -> Option<WorkerAssignment> {
        self.state.lock().assignments.get(&worker_id).cloned()
    }

    // Unregistered workers have not started their slice yet, so they are
    // never counted as exhausted.
    fn all_exhausted(&self, state: &DistributorState) -> bool {
        (0..self.workers).all(|id| {
            state
                .assignments
                .get(&id)
                .is_some_and(WorkerAssignment::is_exhausted)
        })
    }

    fn start_new_cycle(&self, state: &mut DistributorState) {
        state.cycle_count += 1;
        for assignment in state.assignments.values_mut() {
            assignment.rewind();
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cycle();
        }

        info!(
            "Cycle {} complete: all {} workers exhausted their wallets. Pausing {:?} before the next cycle",
            state.cycle_count, self.workers, self.cycle_delay
        );
    }

    fn serve(&self, state: &mut DistributorState, worker_id: usize) -> Option<WalletPair> {
        let assignment = state.assignments.get_mut(&worker_id)?;
        if assignment.is_exhausted() {
            // Empty slice: more workers than senders
            return None;
        }

        let sender_index = assignment.current;
        assignment.current += 1;

        let receiver_index = state.receiver_cursor;
        state.receiver_cursor = (state.receiver_cursor + 1) % self.receivers.len();

        let sender = self.senders.as_slice().get(sender_index)?.clone();
        let receiver = self.receivers.as_slice().get(receiver_index)?.clone();

        Some(WalletPair {
            sender_index,
            receiver_index,
            sender,
            receiver,
        })
    }
}
