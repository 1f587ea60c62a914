use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where a wallet pool is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletSource {
    /// A single JSON array of `{address, privateKey}` records
    File { path: PathBuf },
    /// Every `.json` file in a directory, read in file name order
    Directory { path: PathBuf },
}

impl WalletSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.is_dir() {
            Ok(WalletSource::Directory {
                path: path.to_path_buf(),
            })
        } else if path.is_file() {
            Ok(WalletSource::File {
                path: path.to_path_buf(),
            })
        } else {
            Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WalletSource::File { path } | WalletSource::Directory { path } => path,
        }
    }
}

impl fmt::Display for WalletSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Requested worker parallelism.
///
/// `-1` means "one worker per available core", any positive value is an
/// exact count. Everything else is rejected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerCount {
    All,
    Exact(usize),
}

impl WorkerCount {
    pub fn from_raw(raw: i64, available: usize) -> Result<Self, ConfigError> {
        match raw {
            -1 => Ok(WorkerCount::All),
            n if n >= 1 => Ok(WorkerCount::Exact(n as usize)),
            _ => Err(ConfigError::InvalidWorkerCount {
                requested: raw,
                available,
            }),
        }
    }

    /// Resolves to a concrete count, refusing counts above `available`.
    pub fn resolve(self, available: usize) -> Result<usize, ConfigError> {
        match self {
            WorkerCount::All => Ok(available.max(1)),
            WorkerCount::Exact(n) if n <= available => Ok(n),
            WorkerCount::Exact(n) => Err(ConfigError::InvalidWorkerCount {
                requested: n as i64,
                available,
            }),
        }
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        WorkerCount::All
    }
}

/// Number of parallelism units this host offers.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Parses a required value, mapping failures to a typed [`ConfigError`].
pub fn parse_field<T>(field: &str, raw: Option<String>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = raw.ok_or_else(|| ConfigError::MissingField {
        field: field.to_string(),
    })?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}': {}", raw.trim(), e),
        })
}

/// Like [`parse_field`] but falls back to `default` when the key is unset.
pub fn parse_field_or<T>(field: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => parse_field(field, Some(value)),
        _ => Ok(default),
    }
}
