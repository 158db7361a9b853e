//! Inference statistics for the classifier service.

use crate::types::prediction::Prediction;
use crate::types::taxonomy::{LesionClass, NUM_CLASSES};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Rolling window of latency samples kept in memory
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector for served predictions
pub struct InferenceMetrics {
    /// Total successful predictions
    pub predictions_served: AtomicU64,
    /// Total failed prediction requests
    pub predictions_failed: AtomicU64,
    /// Total stored uploads
    pub uploads_received: AtomicU64,
    /// End-to-end prediction times (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Top-class counts, indexed by class
    class_counts: RwLock<[u64; NUM_CLASSES]>,
    /// Top-confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl InferenceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            predictions_failed: AtomicU64::new(0),
            uploads_received: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            class_counts: RwLock::new([0; NUM_CLASSES]),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, elapsed: Duration, prediction: &Prediction) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(elapsed.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        if let Ok(mut counts) = self.class_counts.write() {
            counts[prediction.class.index()] += 1;
        }

        let bucket = ((prediction.confidence as f64) * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a prediction request that failed
    pub fn record_failure(&self) {
        self.predictions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored upload
    pub fn record_upload(&self) {
        self.uploads_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get top-class counts
    pub fn get_class_counts(&self) -> [u64; NUM_CLASSES] {
        self.class_counts.read().map(|c| *c).unwrap_or_default()
    }

    /// Get confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets.read().map(|b| *b).unwrap_or_default()
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let served = self.predictions_served.load(Ordering::Relaxed);
        let failed = self.predictions_failed.load(Ordering::Relaxed);
        let uploads = self.uploads_received.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();
        let class_counts = self.get_class_counts();
        let confidence = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            LESION CLASSIFIER - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions: {:>8}  │  Failed: {:>6}  │  Uploads: {:>6} ║",
            served, failed, uploads
        );
        info!(
            "║ Throughput: {:>8.3} predictions/s                           ║",
            self.get_throughput()
        );
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predicted Classes:                                           ║");
        for class in LesionClass::ALL {
            let count = class_counts[class.index()];
            let pct = if served > 0 {
                (count as f64 / served as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:6}: {:>6} ({:>5.1}%)", class.code(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Top Confidence Distribution:                                 ║");
        let total: u64 = confidence.iter().sum();
        for (i, &count) in confidence.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for InferenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<InferenceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<InferenceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(probs: [f32; NUM_CLASSES]) -> Prediction {
        Prediction::from_probabilities(&probs, vec![0.0; NUM_CLASSES], 2.77).unwrap()
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = InferenceMetrics::new();

        let mel = prediction([0.05, 0.05, 0.05, 0.05, 0.72, 0.04, 0.04]);
        let nv = prediction([0.1, 0.1, 0.1, 0.1, 0.1, 0.35, 0.15]);

        metrics.record_prediction(Duration::from_micros(100), &mel);
        metrics.record_prediction(Duration::from_micros(300), &nv);
        metrics.record_failure();
        metrics.record_upload();

        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.predictions_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.uploads_received.load(Ordering::Relaxed), 1);

        let counts = metrics.get_class_counts();
        assert_eq!(counts[LesionClass::Mel.index()], 1);
        assert_eq!(counts[LesionClass::Nv.index()], 1);

        let buckets = metrics.get_confidence_distribution();
        assert_eq!(buckets[7], 1);
        assert_eq!(buckets[3], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = InferenceMetrics::new();
        assert_eq!(metrics.get_latency_stats().count, 0);

        let p = prediction([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        for us in [100, 200, 300, 400] {
            metrics.record_prediction(Duration::from_micros(us), &p);
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 250);
        assert_eq!(stats.p50_us, 300);
        assert_eq!(stats.max_us, 400);

        // Confidence of exactly 1.0 lands in the top bucket
        assert_eq!(metrics.get_confidence_distribution()[9], 4);
    }
}
