use crate::config::WalletSource;
use crate::error::{ConfigError, CoreError, WalletError};
use alloy_primitives::Address;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A funded account with its signing key.
///
/// The address is checksummed at load time; the key is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Wallet {
    #[zeroize(skip)]
    pub address: Address,
    pub private_key: String,
}

impl Wallet {
    pub fn new(address: Address, private_key: impl Into<String>) -> Self {
        Self {
            address,
            private_key: private_key.into(),
        }
    }

    /// EIP-55 mixed-case rendering of the address
    pub fn checksum_address(&self) -> String {
        self.address.to_checksum(None)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.checksum_address())
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolRole {
    Sender,
    Receiver,
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolRole::Sender => f.write_str("sender"),
            PoolRole::Receiver => f.write_str("receiver"),
        }
    }
}

/// Immutable, shared list of wallets for one role.
#[derive(Debug, Clone)]
pub struct WalletPool {
    role: PoolRole,
    wallets: Arc<[Wallet]>,
}

impl WalletPool {
    pub fn new(role: PoolRole, wallets: Vec<Wallet>) -> Self {
        Self {
            role,
            wallets: wallets.into(),
        }
    }

    pub fn role(&self) -> PoolRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Wallet, WalletError> {
        self.wallets.get(index).ok_or(WalletError::NotFound {
            index,
            total: self.wallets.len(),
        })
    }

    pub fn as_slice(&self) -> &[Wallet] {
        &self.wallets
    }
}

fn io_error(path: &Path, err: std::io::Error) -> CoreError {
    ConfigError::IoError {
        path: path.display().to_string(),
        msg: err.to_string(),
    }
    .into()
}

#[derive(Deserialize)]
struct RawWallet {
    #[serde(default)]
    address: Option<String>,
    #[serde(default, rename = "privateKey")]
    private_key: Option<String>,
}

pub struct WalletManager;

impl WalletManager {
    /// Loads and validates a wallet pool.
    ///
    /// Malformed records are skipped with a warning. An empty result is fatal.
    pub fn load(source: &WalletSource, role: PoolRole) -> Result<WalletPool, CoreError> {
        info!("Loading {} wallets from {}", role, source);

        let files = match source {
            WalletSource::File { path } => vec![path.clone()],
            WalletSource::Directory { path } => Self::scan_directory(path)?,
        };

        let mut seen = HashSet::new();
        let mut wallets = Vec::new();
        for file in &files {
            for wallet in Self::read_file(file)? {
                if seen.insert(wallet.address) {
                    wallets.push(wallet);
                } else {
                    warn!(
                        "Skipping duplicate {} wallet {} in {:?}",
                        role,
                        wallet.checksum_address(),
                        file
                    );
                }
            }
        }

        if wallets.is_empty() {
            return Err(WalletError::EmptyPool {
                role: role.to_string(),
                path: source.to_string(),
            }
            .into());
        }

        info!("Successfully loaded {} {} wallets", wallets.len(), role);
        Ok(WalletPool::new(role, wallets))
    }

    fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| io_error(dir, e))?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();

        entries.sort();
        info!("Found {} wallet files in {:?}", entries.len(), dir);
        Ok(entries)
    }

    fn read_file(path: &Path) -> Result<Vec<Wallet>, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        Ok(Self::parse_records(&content, &path.display().to_string())?)
    }

    /// Parses a JSON array of wallet records, checksumming every address.
    pub fn parse_records(content: &str, origin: &str) -> Result<Vec<Wallet>, WalletError> {
        let json: Value = serde_json::from_str(content).map_err(|e| WalletError::InvalidJson {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;

        let Value::Array(items) = json else {
            return Err(WalletError::NotAnArray {
                path: origin.to_string(),
            });
        };

        let mut wallets = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match Self::parse_record(item) {
                Ok(wallet) => wallets.push(wallet),
                Err(reason) => warn!("Skipping wallet entry {} in {}: {}", i, origin, reason),
            }
        }
        Ok(wallets)
    }

    fn parse_record(item: Value) -> Result<Wallet, String> {
        let raw: RawWallet = serde_json::from_value(item).map_err(|e| e.to_string())?;

        let address = raw
            .address
            .filter(|a| !a.trim().is_empty())
            .ok_or("missing 'address'")?;
        let private_key = raw
            .private_key
            .filter(|k| !k.trim().is_empty())
            .ok_or("missing 'privateKey'")?;

        let address = Address::from_str(address.trim())
            .map_err(|e| format!("invalid address '{}': {}", address, e))?;

        Ok(Wallet::new(address, private_key.trim()))
    }
}
