//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod partition;
pub(crate) mod retry;
pub(crate) mod runner;
pub(crate) mod wallet_manager;

// Selective exports - only public utilities
pub use logger::{setup_logger, TASK_RESULT_TARGET};
pub use partition::{partition_all, partition_range};
pub use runner::WorkerRunner;
pub use wallet_manager::{PoolRole, Wallet, WalletManager, WalletPool};
