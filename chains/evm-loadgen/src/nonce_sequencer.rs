//! Nonce Sequencer - Batched, per-address nonce allocation
//!
//! Hands out strictly increasing nonces for each sender address without
//! asking the node on every transfer.
//!
//! # Strategy
//!
//! - **Fast path**: pop the next nonce from the address's local batch.
//! - **Slow path**: when the batch is empty, query the pending transaction
//!   count, take `max(pending, local floor)` and reserve the next
//!   `batch_size` consecutive nonces.
//! - **Invalidation**: [`NonceSequencer::reset`] drops the address state after
//!   a failed submission so the next call resynchronises with the node.
//!
//! # Locking
//!
//! Each address has its own mutex, so allocation for different senders never
//! contends. A single reservation lock covers only the slow path (the node
//! query plus installing the new batch).
//!
//! # Example
//!
//! ```rust,ignore
//! let sequencer = NonceSequencer::new(rpc_client.clone(), 5);
//! let nonce = sequencer.next(wallet.address).await?;
//! match submit(nonce).await {
//!     Ok(_) => sequencer.update(wallet.address, nonce + 1).await,
//!     Err(_) => sequencer.reset(wallet.address).await,
//! }
//! ```

use alloy_primitives::Address;
use anyhow::{Context, Result};
use core_logic::{MetricsCollector, NonceSource};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: u64 = 5;

/// Local allocation state for one address
#[derive(Debug, Default)]
struct NonceState {
    /// First nonce not yet reserved locally
    allocated_upto: u64,
    pending_batch: VecDeque<u64>,
}

impl NonceState {
    /// Reserves `[base, base + size)` and returns the exclusive end.
    fn install_batch(&mut self, base: u64, size: u64) -> Result<u64> {
        let end = base
            .checked_add(size)
            .with_context(|| format!("Nonce batch of {} from {} overflows u64", size, base))?;
        self.pending_batch = (base..end).collect();
        self.allocated_upto = end;
        Ok(end)
    }
}

pub struct NonceSequencer {
    source: Arc<dyn NonceSource>,
    batch_size: u64,
    states: RwLock<HashMap<Address, Arc<Mutex<NonceState>>>>,
    reservation: Mutex<()>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl NonceSequencer {
    /// Creates a sequencer backed by `source`. A zero batch size is treated as 1.
    pub fn new(source: Arc<dyn NonceSource>, batch_size: u64) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            states: RwLock::new(HashMap::new()),
            reservation: Mutex::new(()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Next nonce for `address`.
    ///
    /// Nonces for one address are strictly increasing across all callers.
    /// The only suspension point is the node query on batch exhaustion.
    pub async fn next(&self, address: Address) -> Result<u64> {
        let state = self.get_or_create(address).await;
        let mut state = state.lock().await;

        if let Some(nonce) = state.pending_batch.pop_front() {
            return Ok(nonce);
        }

        let _reserve = self.reservation.lock().await;

        let started = Instant::now();
        let pending = self
            .source
            .pending_transaction_count(address)
            .await
            .with_context(|| format!("Failed to fetch pending nonce for {}", address))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_nonce_query(started.elapsed());
        }

        let base = pending.max(state.allocated_upto);
        let end = state.install_batch(base, self.batch_size)?;
        debug!(
            "Reserved nonces [{}, {}) for {} (pending count {})",
            base, end, address, pending
        );

        state
            .pending_batch
            .pop_front()
            .context("Reserved nonce batch was empty")
    }

    /// Raise the local floor for `address` to at least `value`.
    ///
    /// Batched nonces below the new floor are discarded.
    pub async fn update(&self, address: Address, value: u64) {
        let state = self.get_or_create(address).await;
        let mut state = state.lock().await;

        state.pending_batch.retain(|n| *n >= value);
        state.allocated_upto = state.allocated_upto.max(value);
    }

    /// Drop all local state for `address`. The next [`next`](Self::next)
    /// call queries the node again.
    pub async fn reset(&self, address: Address) {
        let removed = self.states.write().await.remove(&address).is_some();
        if removed {
            if let Some(metrics) = &self.metrics {
                metrics.record_nonce_reset();
            }
            info!("Reset nonce state for {}", address);
        }
    }

    /// Nonces still available locally for `address` without a node query
    pub async fn buffered(&self, address: Address) -> usize {
        let state = self.states.read().await.get(&address).cloned();
        match state {
            Some(state) => state.lock().await.pending_batch.len(),
            None => 0,
        }
    }

    /// Number of addresses with local state
    pub async fn tracked_addresses(&self) -> usize {
        self.states.read().await.len()
    }

    async fn get_or_create(&self, address: Address) -> Arc<Mutex<NonceState>> {
        {
            let states = self.states.read().await;
            if let Some(state) = states.get(&address) {
                return state.clone();
            }
        }

        let mut states = self.states.write().await;
        states
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(NonceState::default())))
            .clone()
    }
}
