use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use core_logic::{
    CsvRecordSink, LoadWorker, MetricsCollector, PoolRole, TASK_RESULT_TARGET,
    TransactionLogBuffer, WalletManager, WalletSource, WorkerCount, WorkerRunner,
    available_parallelism, setup_logger,
};
use evm_loadgen::{
    LoadTestConfig, NonceSequencer, RpcClient, TransferTask, TransferWorker, WalletDistributor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker count (-1 = one per available core); overrides WORKER_COUNT
    #[arg(short, long, allow_hyphen_values = true)]
    workers: Option<i64>,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Environment file to load before reading configuration
    #[arg(short, long, default_value = ".env")]
    env_file: String,

    /// Only log errors to the console
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    dotenv::from_filename(&args.env_file).ok();

    let _log_guard = if args.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .init();
        None
    } else {
        setup_logger()
    };

    if let Err(e) = run(args).await {
        error!("Load generator stopped: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = LoadTestConfig::from_env().context("Failed to load configuration")?;

    let available = available_parallelism();
    if let Some(raw) = args.workers {
        config.worker_count = WorkerCount::from_raw(raw, available)?;
    }
    let worker_count = config
        .worker_count
        .resolve(available)
        .context("Invalid worker count")?;

    if !args.quiet {
        println!(
            r#"
        ╔════════════════════════════════════════════════════════════╗
        ║                 EVM LOAD GENERATOR - LIVE LOG              ║
        ╚════════════════════════════════════════════════════════════╝
        "#
        );
    }
    info!(target: TASK_RESULT_TARGET, "Target RPC: {}", config.rpc_url);
    info!(target: TASK_RESULT_TARGET, "Target Chain ID: {}", config.chain_id);
    info!(target: TASK_RESULT_TARGET, "Workers: {} (available: {})", worker_count, available);
    info!(
        target: TASK_RESULT_TARGET,
        "Interval: {:?} - {:?} | Cycle delay: {:?}",
        config.wait_min, config.wait_max, config.cycle_delay
    );

    let sender_source = WalletSource::from_path(&config.sender_path)
        .context("Sender wallet source not found")?;
    let receiver_source = WalletSource::from_path(&config.receiver_path)
        .context("Receiver wallet source not found")?;
    let senders = WalletManager::load(&sender_source, PoolRole::Sender)?;
    let receivers = WalletManager::load(&receiver_source, PoolRole::Receiver)?;
    info!(
        target: TASK_RESULT_TARGET,
        "Loaded {} senders and {} receivers",
        senders.len(),
        receivers.len()
    );

    let metrics = Arc::new(MetricsCollector::new());
    let client = Arc::new(RpcClient::new(&config)?);
    let sequencer = Arc::new(
        NonceSequencer::new(client.clone(), config.nonce_batch_size).with_metrics(metrics.clone()),
    );
    let distributor = Arc::new(
        WalletDistributor::new(senders, receivers, worker_count, config.cycle_delay)?
            .with_metrics(metrics.clone()),
    );

    let started_at = Local::now();
    let sink = Arc::new(CsvRecordSink::create(&config.record_dir)?);
    let log = Arc::new(TransactionLogBuffer::new(
        sink.clone(),
        config.log_flush_threshold,
    ));
    info!(target: TASK_RESULT_TARGET, "Recording transactions to {}", sink.path().display());

    let task = Arc::new(TransferTask::new(
        distributor,
        sequencer,
        client,
        log.clone(),
        metrics.clone(),
    ));

    let workers: Vec<Arc<dyn LoadWorker>> = (0..worker_count)
        .map(|id| {
            Arc::new(TransferWorker::new(
                id,
                task.clone(),
                config.wait_min,
                config.wait_max,
            )) as Arc<dyn LoadWorker>
        })
        .collect();

    let duration = args.duration.map(Duration::from_secs);
    let stats = WorkerRunner::run_workers(workers, duration, CancellationToken::new()).await?;

    let flushed = log
        .flush(true)
        .await
        .context("Final flush of transaction records failed")?;
    let final_path = sink.finalize(started_at)?;
    info!(
        target: TASK_RESULT_TARGET,
        "Saved {} records ({} in final flush) to {}",
        log.persisted(),
        flushed,
        final_path.display()
    );

    info!(
        target: TASK_RESULT_TARGET,
        "Finished: {} sent, {} failed, {} idle ticks",
        stats.success, stats.failed, stats.idle
    );
    info!(target: TASK_RESULT_TARGET, "Metrics: {}", metrics.to_json());

    let metrics_path = config
        .record_dir
        .join(format!("metrics_worker_{}.json", std::process::id()));
    if let Err(e) = metrics
        .export_to_file(&metrics_path.to_string_lossy())
        .await
    {
        warn!("Failed to export metrics to {:?}: {}", metrics_path, e);
    }

    Ok(())
}
