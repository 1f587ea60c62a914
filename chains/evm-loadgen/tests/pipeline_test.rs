//! End-to-end run against in-process collaborators: wallet files on disk,
//! concurrent workers, CSV records at the end.

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use core_logic::{
    CsvRecordSink, LoadWorker, MetricsCollector, NonceSource, PoolRole, SubmitError,
    TransactionLogBuffer, TransactionSubmitter, TransferRequest, WalletManager, WalletSource,
    WorkerRunner,
};
use evm_loadgen::{NonceSequencer, TransferTask, TransferWorker, WalletDistributor};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct ZeroSource;

#[async_trait]
impl NonceSource for ZeroSource {
    async fn pending_transaction_count(&self, _address: Address) -> Result<u64> {
        Ok(0)
    }
}

/// Accepts transfers and remembers every (sender, nonce) it saw
#[derive(Default)]
struct RecordingSubmitter {
    seen: Mutex<Vec<(Address, u64)>>,
}

#[async_trait]
impl TransactionSubmitter for RecordingSubmitter {
    async fn submit(&self, transfer: &TransferRequest) -> Result<String, SubmitError> {
        let mut seen = self.seen.lock();
        seen.push((transfer.sender.address, transfer.nonce));
        Ok(format!("0x{:064x}", seen.len()))
    }
}

fn wallet_json(tag: u8, count: usize) -> String {
    let records: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"address":"0x{:02x}{:038x}","privateKey":"0x{:064x}"}}"#,
                tag,
                i,
                i + 1
            )
        })
        .collect();
    format!("[{}]", records.join(","))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_run_writes_records() {
    let dir = tempfile::tempdir().unwrap();
    let senders_dir = dir.path().join("senders");
    fs::create_dir(&senders_dir).unwrap();
    fs::write(senders_dir.join("a.json"), wallet_json(0xaa, 4)).unwrap();
    fs::write(senders_dir.join("notes.txt"), "ignored").unwrap();
    let receivers_file = dir.path().join("receivers.json");
    fs::write(&receivers_file, wallet_json(0xbb, 2)).unwrap();

    let senders = WalletManager::load(
        &WalletSource::from_path(&senders_dir).unwrap(),
        PoolRole::Sender,
    )
    .unwrap();
    let receivers = WalletManager::load(
        &WalletSource::from_path(&receivers_file).unwrap(),
        PoolRole::Receiver,
    )
    .unwrap();
    assert_eq!(senders.len(), 4);
    assert_eq!(receivers.len(), 2);

    let metrics = Arc::new(MetricsCollector::new());
    let submitter = Arc::new(RecordingSubmitter::default());
    let distributor = Arc::new(
        WalletDistributor::new(senders, receivers, 2, Duration::ZERO)
            .unwrap()
            .with_metrics(metrics.clone()),
    );
    let sequencer =
        Arc::new(NonceSequencer::new(Arc::new(ZeroSource), 5).with_metrics(metrics.clone()));

    let started = Local::now();
    let record_dir = dir.path().join("transaction_history");
    let sink = Arc::new(CsvRecordSink::create(&record_dir).unwrap());
    let log = Arc::new(TransactionLogBuffer::new(sink.clone(), 3));

    let task = Arc::new(TransferTask::new(
        distributor.clone(),
        sequencer,
        submitter.clone(),
        log.clone(),
        metrics.clone(),
    ));
    let workers: Vec<Arc<dyn LoadWorker>> = (0..2)
        .map(|id| {
            Arc::new(TransferWorker::new(
                id,
                task.clone(),
                Duration::from_millis(1),
                Duration::from_millis(3),
            )) as Arc<dyn LoadWorker>
        })
        .collect();

    let stats = WorkerRunner::run_workers(
        workers,
        Some(Duration::from_millis(150)),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    log.flush(true).await.unwrap();
    assert_eq!(log.pending(), 0);
    let final_path = sink.finalize(started).unwrap();

    // Every sender's nonces are unique and gap-free from zero
    let seen = submitter.seen.lock().clone();
    assert_eq!(seen.len() as u64, stats.success);
    assert!(stats.success > 0);
    assert_eq!(stats.failed, 0);
    let mut per_sender: HashMap<Address, Vec<u64>> = HashMap::new();
    for (address, nonce) in &seen {
        per_sender.entry(*address).or_default().push(*nonce);
    }
    for nonces in per_sender.values() {
        let unique: HashSet<&u64> = nonces.iter().collect();
        assert_eq!(unique.len(), nonces.len());
        let mut sorted = nonces.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..nonces.len() as u64).collect::<Vec<_>>());
    }

    let name = final_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("transaction_log_"));
    assert!(name.ends_with(&format!("_worker_{}.csv", std::process::id())));
    assert!(!sink.path().exists());

    let csv = fs::read_to_string(&final_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Sender Address,Transaction Hash,Status,Time Taken,Nonce,Worker ID,Error Message"
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len() as u64, stats.success);
    assert!(rows.iter().all(|row| row.contains(",Success,")));
    assert_eq!(log.persisted(), stats.success);

    assert_eq!(metrics.transfers_success(), stats.success);
    assert!(metrics.snapshot().distribution.cycles_completed >= 1);
}
