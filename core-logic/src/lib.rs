//! # Core Logic - Shared Utilities for the Load Generator
//!
//! This crate provides the chain-agnostic pieces shared by load generator
//! binaries: wallet pool loading, partitioning, outcome records, metrics,
//! logging, and the worker runner.
//!
//! ## Modules
//!
//! - [`config`] - Wallet sources, worker count resolution, env value parsing
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Run-wide transfer and nonce counters
//! - [`records`] - Outcome record buffer and CSV persistence
//! - [`traits`] - Collaborator trait definitions
//! - `utils` - Wallet loading, partitioning, logging, retry, runner

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod error;
pub mod metrics;
pub mod records;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{available_parallelism, WalletSource, WorkerCount};
pub use error::{
    ConfigError, CoreError, DistributionError, NetworkError, SubmitError, WalletError,
};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use records::{
    CsvRecordSink, TransactionLogBuffer, TransactionLogEntry, TxStatus, DEFAULT_FLUSH_THRESHOLD,
};
pub use traits::{
    LoadWorker, NonceSource, RecordSink, TransactionSubmitter, TransferRequest, WorkerStats,
};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{
    partition_all, partition_range, setup_logger, PoolRole, Wallet, WalletManager, WalletPool,
    WorkerRunner, TASK_RESULT_TARGET,
};

// Export retry utilities for testing
pub use utils::retry::{is_transient_error, with_retry, RetryConfig};
