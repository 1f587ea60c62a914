use crate::error::SubmitError;
use crate::records::TransactionLogEntry;
use crate::utils::Wallet;
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub success: u64,
    pub failed: u64,
    pub idle: u64,
}

/// One long-running unit of load generation.
#[async_trait]
pub trait LoadWorker: Send + Sync {
    fn worker_id(&self) -> usize;

    /// Issue transfers until the token is cancelled
    async fn start(
        &self,
        cancellation_token: tokio_util::sync::CancellationToken,
    ) -> Result<WorkerStats>;
}

/// Authoritative source for an account's next usable nonce.
#[async_trait]
pub trait NonceSource: Send + Sync {
    /// Transaction count of `address` including pending transactions
    async fn pending_transaction_count(&self, address: Address) -> Result<u64>;
}

/// A value transfer ready to be signed and broadcast.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender: Wallet,
    pub receiver: Address,
    pub nonce: u64,
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Signs and broadcasts the transfer, returning the transaction hash
    async fn submit(&self, transfer: &TransferRequest) -> Result<String, SubmitError>;
}

/// Durable destination for flushed outcome records.
pub trait RecordSink: Send + Sync {
    fn persist(&self, entries: &[TransactionLogEntry]) -> Result<()>;
}
