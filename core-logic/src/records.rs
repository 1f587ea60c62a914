//! # Transaction Records
//!
//! Outcome records produced by workers, an in-memory buffer that batches
//! them, and the CSV file they are flushed to.
//!
//! Workers call [`TransactionLogBuffer::record`] at high frequency, so the
//! append lock is only ever held to push or to swap the whole buffer out.
//! Writing to the sink happens under a separate async lock, off the runtime
//! threads.

use crate::traits::RecordSink;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 1000;

pub const CSV_HEADER: [&str; 7] = [
    "Sender Address",
    "Transaction Hash",
    "Status",
    "Time Taken",
    "Nonce",
    "Worker ID",
    "Error Message",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Success => f.write_str("Success"),
            TxStatus::Failed => f.write_str("Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLogEntry {
    pub sender: String,
    pub tx_hash: Option<String>,
    pub status: TxStatus,
    pub elapsed: Duration,
    pub nonce: Option<u64>,
    pub worker_id: usize,
    pub error: Option<String>,
}

impl TransactionLogEntry {
    pub fn success(
        sender: String,
        tx_hash: String,
        elapsed: Duration,
        nonce: u64,
        worker_id: usize,
    ) -> Self {
        Self {
            sender,
            tx_hash: Some(tx_hash),
            status: TxStatus::Success,
            elapsed,
            nonce: Some(nonce),
            worker_id,
            error: None,
        }
    }

    pub fn failure(
        sender: String,
        elapsed: Duration,
        nonce: Option<u64>,
        worker_id: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            tx_hash: None,
            status: TxStatus::Failed,
            elapsed,
            nonce,
            worker_id,
            error: Some(error.into()),
        }
    }

    /// Column values in [`CSV_HEADER`] order
    pub fn csv_fields(&self) -> [String; 7] {
        [
            self.sender.clone(),
            self.tx_hash.clone().unwrap_or_else(|| "N/A".to_string()),
            self.status.to_string(),
            format!("{:.2}s", self.elapsed.as_secs_f64()),
            self.nonce
                .map(|n| n.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            self.worker_id.to_string(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Shared, append-only buffer of outcome records.
pub struct TransactionLogBuffer {
    entries: Mutex<Vec<TransactionLogEntry>>,
    /// Serializes sink writes so batches land in the order they were taken
    write_lock: AsyncMutex<()>,
    sink: Arc<dyn RecordSink>,
    threshold: usize,
    persisted: AtomicU64,
    failed_writes: AtomicU64,
}

impl TransactionLogBuffer {
    pub fn new(sink: Arc<dyn RecordSink>, threshold: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(threshold.max(1))),
            write_lock: AsyncMutex::new(()),
            sink,
            threshold: threshold.max(1),
            persisted: AtomicU64::new(0),
            failed_writes: AtomicU64::new(0),
        }
    }

    /// Appends an entry, flushing if the buffer reached its threshold.
    pub async fn record(&self, entry: TransactionLogEntry) -> Result<()> {
        let full = {
            let mut entries = self.entries.lock();
            entries.push(entry);
            entries.len() >= self.threshold
        };

        if full {
            self.flush(false).await?;
        }
        Ok(())
    }

    /// Writes buffered entries to the sink and returns how many were written.
    ///
    /// Without `force` nothing happens below the threshold. The sink runs on
    /// the blocking pool. A failed write puts the batch back in front of
    /// newer entries.
    pub async fn flush(&self, force: bool) -> Result<usize> {
        let _writer = self.write_lock.lock().await;

        let batch = {
            let mut entries = self.entries.lock();
            if entries.is_empty() || (!force && entries.len() < self.threshold) {
                return Ok(0);
            }
            std::mem::take(&mut *entries)
        };

        let sink = self.sink.clone();
        let written = tokio::task::spawn_blocking(move || {
            let outcome = sink.persist(&batch);
            (batch, outcome)
        })
        .await;

        let (batch, outcome) = match written {
            Ok(written) => written,
            Err(e) => {
                self.failed_writes.fetch_add(1, Ordering::SeqCst);
                return Err(anyhow::anyhow!("Record writer task failed: {}", e));
            }
        };

        match outcome {
            Ok(()) => {
                self.persisted.fetch_add(batch.len() as u64, Ordering::SeqCst);
                debug!("Transactions saved successfully ({} records)", batch.len());
                Ok(batch.len())
            }
            Err(e) => {
                self.failed_writes.fetch_add(1, Ordering::SeqCst);
                warn!("Error saving {} transactions: {:#}", batch.len(), e);
                let mut entries = self.entries.lock();
                let newer = std::mem::replace(&mut *entries, batch);
                entries.extend(newer);
                Err(e)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::SeqCst)
    }
}

/// Per-process CSV record file.
///
/// The file is named after the process id while the run is active so
/// concurrent load generator processes never share a file.
#[derive(Debug)]
pub struct CsvRecordSink {
    dir: PathBuf,
    path: PathBuf,
    pid: u32,
}

impl CsvRecordSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create record directory {:?}", dir))?;

        let pid = std::process::id();
        let path = dir.join(format!("transaction_history_worker_{}.csv", pid));

        if !path.exists() {
            let mut file = fs::File::create(&path)
                .with_context(|| format!("Failed to create record file {:?}", path))?;
            writeln!(file, "{}", csv_line(&CSV_HEADER))?;
        }

        info!("Transaction log initialized at {:?}", path);
        Ok(Self { dir, path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the record file to embed the run's start/stop time and pid.
    ///
    /// Callers must force-flush the buffer first.
    pub fn finalize(&self, started: DateTime<Local>) -> Result<PathBuf> {
        let stopped = Local::now();
        let target = self.dir.join(format!(
            "transaction_log_{}_to_{}_worker_{}.csv",
            started.format("%d-%m-%Y_%H_%M_%S"),
            stopped.format("%d-%m-%Y_%H_%M_%S"),
            self.pid
        ));

        fs::rename(&self.path, &target)
            .with_context(|| format!("Failed to rename {:?} to {:?}", self.path, target))?;
        info!("Transaction log saved to {:?}", target);
        Ok(target)
    }
}

impl RecordSink for CsvRecordSink {
    fn persist(&self, entries: &[TransactionLogEntry]) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open record file {:?}", self.path))?;

        let mut writer = BufWriter::new(file);
        for entry in entries {
            writeln!(writer, "{}", csv_line(&entry.csv_fields()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
