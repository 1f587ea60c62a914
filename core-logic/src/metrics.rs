use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub transfers: TransferMetrics,
    pub latency: LatencyMetrics,
    pub nonce: NonceMetrics,
    pub distribution: DistributionMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferMetrics {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyMetrics {
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NonceMetrics {
    pub rpc_queries: u64,
    pub avg_query_ms: f64,
    pub resets: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionMetrics {
    pub cycles_completed: u64,
    pub idle_ticks: u64,
}

/// Aggregate counters shared by every worker of one run.
#[derive(Debug)]
pub struct MetricsCollector {
    transfers_total: AtomicU64,
    transfers_success: AtomicU64,
    transfers_failed: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_min_ms: AtomicU64,
    latency_max_ms: AtomicU64,
    nonce_queries: AtomicU64,
    nonce_query_sum_ms: AtomicU64,
    nonce_resets: AtomicU64,
    cycles_completed: AtomicU64,
    idle_ticks: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            transfers_total: AtomicU64::new(0),
            transfers_success: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_min_ms: AtomicU64::new(u64::MAX),
            latency_max_ms: AtomicU64::new(0),
            nonce_queries: AtomicU64::new(0),
            nonce_query_sum_ms: AtomicU64::new(0),
            nonce_resets: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transfer(&self, duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;

        self.transfers_total.fetch_add(1, Ordering::SeqCst);
        self.latency_sum_ms.fetch_add(duration_ms, Ordering::SeqCst);
        self.latency_min_ms.fetch_min(duration_ms, Ordering::SeqCst);
        self.latency_max_ms.fetch_max(duration_ms, Ordering::SeqCst);

        if success {
            self.transfers_success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.transfers_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_nonce_query(&self, latency: Duration) {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        self.nonce_query_sum_ms
            .fetch_add(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_nonce_reset(&self) {
        self.nonce_resets.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_cycle(&self) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_idle(&self) {
        self.idle_ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.transfers_total.load(Ordering::SeqCst);
        let success = self.transfers_success.load(Ordering::SeqCst);
        let latency_sum = self.latency_sum_ms.load(Ordering::SeqCst);
        let latency_min = self.latency_min_ms.load(Ordering::SeqCst);
        let queries = self.nonce_queries.load(Ordering::SeqCst);
        let query_sum = self.nonce_query_sum_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.uptime().as_secs(),
            transfers: TransferMetrics {
                total,
                success,
                failed: self.transfers_failed.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    success as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            },
            latency: LatencyMetrics {
                avg_ms: if total > 0 {
                    latency_sum as f64 / total as f64
                } else {
                    0.0
                },
                min_ms: if latency_min == u64::MAX { 0 } else { latency_min },
                max_ms: self.latency_max_ms.load(Ordering::SeqCst),
            },
            nonce: NonceMetrics {
                rpc_queries: queries,
                avg_query_ms: if queries > 0 {
                    query_sum as f64 / queries as f64
                } else {
                    0.0
                },
                resets: self.nonce_resets.load(Ordering::SeqCst),
            },
            distribution: DistributionMetrics {
                cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
                idle_ticks: self.idle_ticks.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn transfers_total(&self) -> u64 {
        self.transfers_total.load(Ordering::SeqCst)
    }

    pub fn transfers_success(&self) -> u64 {
        self.transfers_success.load(Ordering::SeqCst)
    }

    pub fn transfers_failed(&self) -> u64 {
        self.transfers_failed.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector() {
        let metrics = MetricsCollector::new();

        metrics.record_transfer(Duration::from_millis(100), true);
        metrics.record_transfer(Duration::from_millis(200), true);
        metrics.record_transfer(Duration::from_millis(150), false);

        assert_eq!(metrics.transfers_total(), 3);
        assert_eq!(metrics.transfers_success(), 2);
        assert_eq!(metrics.transfers_failed(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.latency.min_ms, 100);
        assert_eq!(snapshot.latency.max_ms, 200);
        assert!((snapshot.transfers.success_rate - 66.67).abs() < 0.1);
    }

    #[test]
    fn test_empty_snapshot_has_zero_minimum() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.latency.min_ms, 0);
        assert_eq!(snapshot.transfers.success_rate, 0.0);
    }

    #[test]
    fn test_json_export() {
        let metrics = MetricsCollector::new();
        metrics.record_transfer(Duration::from_millis(100), true);
        metrics.record_nonce_query(Duration::from_millis(30));
        metrics.record_cycle();

        let json = metrics.to_json();
        assert!(json.contains("transfers"));
        assert!(json.contains("cycles_completed"));
    }
}
