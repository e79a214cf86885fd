//! Scoring metrics and periodic reporting.

use crate::error::ScoringError;
use crate::types::PredictionResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Processing times kept for percentile estimates
const MAX_TIMING_SAMPLES: usize = 10_000;

/// Metrics collector for the scoring service
pub struct ScoringMetrics {
    /// Score calls (a batch counts once)
    pub requests: AtomicU64,
    /// Orders scored
    pub orders_scored: AtomicU64,
    /// Orders above the decision threshold
    pub fraud_verdicts: AtomicU64,
    /// Requests rejected as malformed
    pub rejected: AtomicU64,
    /// Requests failed on our side (schema, inference)
    pub failures: AtomicU64,
    /// Categorical fallbacks per column
    fallbacks_by_column: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Confidence distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            orders_scored: AtomicU64::new(0),
            fraud_verdicts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            fallbacks_by_column: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one successful score call
    pub fn record_scored(&self, processing_time: Duration, results: &[PredictionResult]) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.orders_scored
            .fetch_add(results.len() as u64, Ordering::Relaxed);
        self.fraud_verdicts.fetch_add(
            results.iter().filter(|r| r.is_fraud).count() as u64,
            Ordering::Relaxed,
        );

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_TIMING_SAMPLES {
                times.drain(0..MAX_TIMING_SAMPLES / 2);
            }
        }

        if let Ok(mut buckets) = self.score_buckets.write() {
            for result in results {
                let bucket = (result.confidence * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }
    }

    /// Record a categorical value routed to a fallback indicator
    pub fn record_fallback(&self, column: &str) {
        if let Ok(mut by_column) = self.fallbacks_by_column.write() {
            *by_column.entry(column.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a failed score call
    pub fn record_error(&self, error: &ScoringError) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if error.is_client_error() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Orders scored per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.orders_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or_default()
    }

    pub fn get_fallbacks_by_column(&self) -> HashMap<String, u64> {
        self.fallbacks_by_column
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Point-in-time copy for the metrics endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            orders_scored: self.orders_scored.load(Ordering::Relaxed),
            fraud_verdicts: self.fraud_verdicts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            throughput: self.get_throughput(),
            processing: self.get_processing_stats(),
            fallbacks_by_column: self.get_fallbacks_by_column(),
            score_distribution: self.get_score_distribution(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let fraud_rate = if snapshot.orders_scored > 0 {
            (snapshot.fraud_verdicts as f64 / snapshot.orders_scored as f64) * 100.0
        } else {
            0.0
        };

        info!(
            requests = snapshot.requests,
            orders_scored = snapshot.orders_scored,
            fraud_verdicts = snapshot.fraud_verdicts,
            fraud_rate = %format!("{:.1}%", fraud_rate),
            rejected = snapshot.rejected,
            failures = snapshot.failures,
            throughput = %format!("{:.1} orders/s", snapshot.throughput),
            "Scoring summary"
        );
        info!(
            mean_us = snapshot.processing.mean_us,
            p50_us = snapshot.processing.p50_us,
            p95_us = snapshot.processing.p95_us,
            p99_us = snapshot.processing.p99_us,
            "Processing time"
        );

        for (column, count) in &snapshot.fallbacks_by_column {
            info!(column = %column, count = count, "Categorical fallbacks");
        }

        let total: u64 = snapshot.score_distribution.iter().sum();
        for (i, &count) in snapshot.score_distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub orders_scored: u64,
    pub fraud_verdicts: u64,
    pub rejected: u64,
    pub failures: u64,
    pub throughput: f64,
    pub processing: ProcessingStats,
    pub fallbacks_by_column: HashMap<String, u64>,
    pub score_distribution: [u64; 10],
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
