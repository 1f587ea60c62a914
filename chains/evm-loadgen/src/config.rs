//! Configuration loader for evm-loadgen
//!
//! Values come from the process environment (a `.env` file is loaded first
//! by the binary). Every key is parsed into a typed field up front so a bad
//! value stops the run before any worker starts.

use crate::nonce_sequencer::DEFAULT_BATCH_SIZE;
use alloy_primitives::U256;
use alloy_primitives::utils::{parse_ether, parse_units};
use core_logic::ConfigError;
use core_logic::WorkerCount;
use core_logic::config::{parse_field, parse_field_or};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SENDER_WALLET_PATH: &str = "sender_wallets.json";
pub const DEFAULT_RECEIVER_WALLET_PATH: &str = "receiver_wallets.json";
pub const DEFAULT_RECORD_DIR: &str = "transaction_history";
pub const DEFAULT_CYCLE_DELAY_SECS: u64 = 3;

/// Configuration for one load run
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// JSON-RPC endpoint
    pub rpc_url: Url,
    pub chain_id: u64,
    /// Value per transfer in wei
    pub value_wei: U256,
    /// Legacy gas price in wei
    pub gas_price_wei: u128,
    pub gas_limit: u64,
    pub sender_path: PathBuf,
    pub receiver_path: PathBuf,
    /// Pause applied once every worker has exhausted its range
    pub cycle_delay: Duration,
    pub worker_count: WorkerCount,
    pub nonce_batch_size: u64,
    pub log_flush_threshold: usize,
    pub wait_min: Duration,
    pub wait_max: Duration,
    pub record_dir: PathBuf,
}

impl LoadTestConfig {
    /// Load configuration from `std::env`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// # Example
    /// ```ignore
    /// let vars: HashMap<&str, &str> = ...;
    /// let config = LoadTestConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))?;
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_host: String = parse_field("RPC_HOST", lookup("RPC_HOST"))?;
        let rpc_url = Url::parse(&rpc_host).map_err(|_| ConfigError::InvalidRpcUrl {
            url: rpc_host.clone(),
        })?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRpcUrl { url: rpc_host });
        }

        let chain_id: u64 = parse_field("CHAIN_ID", lookup("CHAIN_ID"))?;

        let ether_value: String = parse_field("ETHER_VALUE", lookup("ETHER_VALUE"))?;
        let value_wei = parse_ether(&ether_value).map_err(|e| ConfigError::InvalidValue {
            field: "ETHER_VALUE".to_string(),
            reason: format!("'{}': {}", ether_value, e),
        })?;

        let gas_price: String = parse_field("GAS_PRICE", lookup("GAS_PRICE"))?;
        let gas_price_wei = parse_gwei(&gas_price)?;

        let gas_limit: u64 = parse_field("GAS", lookup("GAS"))?;

        let sender_path: PathBuf = parse_field_or(
            "SENDER_WALLET_PATH",
            lookup("SENDER_WALLET_PATH"),
            PathBuf::from(DEFAULT_SENDER_WALLET_PATH),
        )?;
        let receiver_path: PathBuf = parse_field_or(
            "RECEIVER_WALLET_PATH",
            lookup("RECEIVER_WALLET_PATH"),
            PathBuf::from(DEFAULT_RECEIVER_WALLET_PATH),
        )?;

        let cycle_delay_secs: u64 = parse_field_or(
            "CYCLE_DELAY_SECS",
            lookup("CYCLE_DELAY_SECS"),
            DEFAULT_CYCLE_DELAY_SECS,
        )?;

        let raw_workers: i64 = parse_field_or("WORKER_COUNT", lookup("WORKER_COUNT"), -1)?;
        let worker_count =
            WorkerCount::from_raw(raw_workers, core_logic::available_parallelism())?;

        let nonce_batch_size: u64 = parse_field_or(
            "NONCE_BATCH_SIZE",
            lookup("NONCE_BATCH_SIZE"),
            DEFAULT_BATCH_SIZE,
        )?;
        require_positive("NONCE_BATCH_SIZE", nonce_batch_size as u128)?;

        let log_flush_threshold: usize = parse_field_or(
            "LOG_FLUSH_THRESHOLD",
            lookup("LOG_FLUSH_THRESHOLD"),
            core_logic::DEFAULT_FLUSH_THRESHOLD,
        )?;
        require_positive("LOG_FLUSH_THRESHOLD", log_flush_threshold as u128)?;

        let wait_min_secs: u64 = parse_field_or("WAIT_MIN_SECS", lookup("WAIT_MIN_SECS"), 1)?;
        let wait_max_secs: u64 = parse_field_or("WAIT_MAX_SECS", lookup("WAIT_MAX_SECS"), 5)?;
        if wait_min_secs > wait_max_secs {
            return Err(ConfigError::InvalidValue {
                field: "WAIT_MIN_SECS".to_string(),
                reason: format!(
                    "minimum wait {}s exceeds maximum wait {}s",
                    wait_min_secs, wait_max_secs
                ),
            });
        }

        let record_dir: PathBuf = parse_field_or(
            "RECORD_DIR",
            lookup("RECORD_DIR"),
            PathBuf::from(DEFAULT_RECORD_DIR),
        )?;

        Ok(Self {
            rpc_url,
            chain_id,
            value_wei,
            gas_price_wei,
            gas_limit,
            sender_path,
            receiver_path,
            cycle_delay: Duration::from_secs(cycle_delay_secs),
            worker_count,
            nonce_batch_size,
            log_flush_threshold,
            wait_min: Duration::from_secs(wait_min_secs),
            wait_max: Duration::from_secs(wait_max_secs),
            record_dir,
        })
    }
}

/// Uniformly random duration in `[min, max]` at millisecond resolution
pub fn random_between(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
    if lo >= hi {
        return min;
    }
    let mut rng = rand::thread_rng();
    Duration::from_millis(rand::Rng::gen_range(&mut rng, lo..=hi))
}

fn parse_gwei(raw: &str) -> Result<u128, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: "GAS_PRICE".to_string(),
        reason: format!("'{}': {}", raw, reason),
    };
    let wei: U256 = parse_units(raw, "gwei")
        .map_err(|e| invalid(e.to_string()))?
        .get_absolute();
    u128::try_from(wei).map_err(|_| invalid("gas price out of range".to_string()))
}

fn require_positive(field: &str, value: u128) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("RPC_HOST", "http://127.0.0.1:8545"),
            ("CHAIN_ID", "1337"),
            ("ETHER_VALUE", "0.001"),
            ("GAS_PRICE", "1.5"),
            ("GAS", "21000"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<LoadTestConfig, ConfigError> {
        LoadTestConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.chain_id, 1337);
        assert_eq!(config.value_wei, U256::from(1_000_000_000_000_000u64));
        assert_eq!(config.gas_price_wei, 1_500_000_000);
        assert_eq!(config.gas_limit, 21000);
        assert_eq!(config.sender_path, PathBuf::from("sender_wallets.json"));
        assert_eq!(config.receiver_path, PathBuf::from("receiver_wallets.json"));
        assert_eq!(config.cycle_delay, Duration::from_secs(3));
        assert_eq!(config.worker_count, WorkerCount::All);
        assert_eq!(config.nonce_batch_size, 5);
        assert_eq!(config.log_flush_threshold, 1000);
        assert_eq!(config.wait_min, Duration::from_secs(1));
        assert_eq!(config.wait_max, Duration::from_secs(5));
        assert_eq!(config.record_dir, PathBuf::from("transaction_history"));
    }

    #[test]
    fn test_missing_required_field() {
        let mut vars = base_vars();
        vars.remove("CHAIN_ID");

        let err = load(&vars).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "CHAIN_ID".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_rpc_url() {
        let mut vars = base_vars();
        vars.insert("RPC_HOST", "not a url");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidRpcUrl { .. })
        ));

        vars.insert("RPC_HOST", "ftp://example.com");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidRpcUrl { .. })
        ));
    }

    #[test]
    fn test_worker_count_validation() {
        let mut vars = base_vars();
        vars.insert("WORKER_COUNT", "0");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidWorkerCount { requested: 0, .. })
        ));

        vars.insert("WORKER_COUNT", "-2");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidWorkerCount { requested: -2, .. })
        ));

        vars.insert("WORKER_COUNT", "1");
        assert_eq!(load(&vars).unwrap().worker_count, WorkerCount::Exact(1));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut vars = base_vars();
        vars.insert("NONCE_BATCH_SIZE", "0");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "NONCE_BATCH_SIZE"
        ));
    }

    #[test]
    fn test_unparseable_values() {
        let mut vars = base_vars();
        vars.insert("GAS", "lots");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "GAS"
        ));

        let mut vars = base_vars();
        vars.insert("ETHER_VALUE", "one");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "ETHER_VALUE"
        ));
    }

    #[test]
    fn test_wait_bounds_checked() {
        let mut vars = base_vars();
        vars.insert("WAIT_MIN_SECS", "6");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_random_between_bounds() {
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(20);
        for _ in 0..100 {
            let wait = random_between(min, max);
            assert!(wait >= min && wait <= max);
        }
        assert_eq!(random_between(max, max), max);
    }
}
