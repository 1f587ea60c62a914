//! EVM Load Generator - Multi-worker value-transfer load against a JSON-RPC node
//!
//! Drives sustained, concurrent transfer traffic from a pool of pre-funded
//! sender wallets, coordinating wallets and nonces so no two workers collide.
//!
//! # Architecture
//!
//! - **[`WalletDistributor`]**: partitions the sender pool across workers,
//!   rotates receivers and detects cycle completion
//! - **[`NonceSequencer`]**: batched per-address nonce allocation seeded from
//!   the node's pending transaction count
//! - **[`RpcClient`]**: local signing plus JSON-RPC transport
//! - **[`TransferTask`]** / **[`TransferWorker`]**: one transfer, and the loop
//!   that repeats it until cancelled
//!
//! Outcome records, metrics, logging and the worker runner come from
//! `core_logic`.
//!
//! # Quick Start
//!
//! ```bash
//! # Run with settings from .env
//! cargo run -p evm-loadgen --bin evm-loadgen
//!
//! # Four workers for five minutes
//! cargo run -p evm-loadgen --bin evm-loadgen -- --workers 4 --duration 300
//! ```

pub mod client;
pub mod config;
pub mod distributor;
pub mod nonce_sequencer;
pub mod worker;

pub use client::RpcClient;
pub use config::LoadTestConfig;
pub use distributor::{WalletDistributor, WalletPair, WorkerAssignment};
pub use nonce_sequencer::NonceSequencer;
pub use worker::{TaskOutcome, TransferTask, TransferWorker};
