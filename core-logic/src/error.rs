//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// Startup code wraps every fatal condition in this enum so `main` can
/// refuse to start with one readable message.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Network(NetworkError),

    #[error(transparent)]
    Distribution(DistributionError),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<WalletError> for CoreError {
    fn from(e: WalletError) -> Self {
        CoreError::Wallet(e)
    }
}

impl From<NetworkError> for CoreError {
    fn from(e: NetworkError) -> Self {
        CoreError::Network(e)
    }
}

impl From<DistributionError> for CoreError {
    fn from(e: DistributionError) -> Self {
        CoreError::Distribution(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(
        "Invalid worker count {requested}: use -1 for all {available} available cores \
         or a positive count up to {available}"
    )]
    InvalidWorkerCount { requested: i64, available: usize },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet pool loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("No usable {role} wallets found in '{path}'")]
    EmptyPool { role: String, path: String },

    #[error("Wallet file '{path}' should contain a JSON array")]
    NotAnArray { path: String },

    #[error("Wallet file '{path}' is not valid JSON: {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("Wallet not found at index {index} (total wallets: {total})")]
    NotFound { index: usize, total: usize },
}

/// Network and RPC-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("RPC request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("RPC error from {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },
}

/// Wallet distribution and partitioning errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Worker id {worker_id} is outside the configured range 0..{workers}")]
    WorkerOutOfRange { worker_id: usize, workers: usize },

    #[error("Cannot distribute from an empty {role} pool")]
    EmptyPool { role: String },
}

/// Per-request submission failures.
///
/// These are always recoverable: the worker records them as a Failed
/// outcome and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Transaction rejected: {message}")]
    Rpc { message: String },

    #[error("Error parsing JSON response: {reason}")]
    MalformedResponse { reason: String },

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Signing failed: {reason}")]
    Signing { reason: String },
}

impl SubmitError {
    /// True when the node reported a nonce conflict for this submission.
    pub fn is_nonce_conflict(&self) -> bool {
        match self {
            SubmitError::Rpc { message } => {
                let msg = message.to_lowercase();
                msg.contains("nonce too low")
                    || msg.contains("nonce too high")
                    || msg.contains("already known")
                    || msg.contains("replacement transaction underpriced")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_message_mentions_limits() {
        let err = ConfigError::InvalidWorkerCount {
            requested: 0,
            available: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("-1"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn test_nonce_conflict_detection() {
        let low = SubmitError::Rpc {
            message: "Nonce too low: next nonce 12, tx nonce 9".to_string(),
        };
        let funds = SubmitError::Rpc {
            message: "insufficient funds for gas * price + value".to_string(),
        };
        let transport = SubmitError::Transport {
            reason: "nonce too low".to_string(),
        };

        assert!(low.is_nonce_conflict());
        assert!(!funds.is_nonce_conflict());
        assert!(!transport.is_nonce_conflict());
    }

    #[test]
    fn test_network_error_messages() {
        let timeout = NetworkError::Timeout {
            timeout_ms: 30000,
            endpoint: "http://127.0.0.1:8545/".to_string(),
        };
        assert_eq!(
            timeout.to_string(),
            "RPC request timeout after 30000ms to http://127.0.0.1:8545/"
        );

        let err: CoreError = NetworkError::Rpc {
            endpoint: "http://node/".to_string(),
            message: "header not found".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Network(NetworkError::Rpc { .. })));
    }

    #[test]
    fn test_core_error_wraps_transparently() {
        let err: CoreError = WalletError::EmptyPool {
            role: "sender".to_string(),
            path: "wallets.json".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "No usable sender wallets found in 'wallets.json'"
        );
    }
}
