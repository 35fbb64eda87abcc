//! Request counters and latency statistics for the price service.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the prediction endpoints
pub struct ServiceMetrics {
    /// Prediction requests received on any endpoint
    pub requests: AtomicU64,
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Requests rejected with a 4xx
    pub client_errors: AtomicU64,
    /// Requests failed with a 5xx
    pub inference_errors: AtomicU64,
    /// Fallback encodings by feature
    fallbacks: RwLock<HashMap<String, u64>>,
    /// End-to-end prediction times (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Adjusted prices in lakhs
    prices: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            inference_errors: AtomicU64::new(0),
            fallbacks: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            prices: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record an incoming prediction request
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, latency: Duration, price_lakhs: f64, fallbacks: &[&str]) {
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        if let Ok(mut prices) = self.prices.write() {
            prices.push(price_lakhs);
            if prices.len() > MAX_SAMPLES {
                prices.drain(0..MAX_SAMPLES / 2);
            }
        }

        if !fallbacks.is_empty() {
            if let Ok(mut by_feature) = self.fallbacks.write() {
                for feature in fallbacks {
                    *by_feature.entry(feature.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Record a failed request
    pub fn record_failure(&self, client_error: bool) {
        if client_error {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inference_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get latency statistics
    pub fn get_latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Mean predicted price in lakhs over the retained samples
    pub fn get_mean_price(&self) -> f64 {
        match self.prices.read() {
            Ok(prices) if !prices.is_empty() => prices.iter().sum::<f64>() / prices.len() as f64,
            _ => 0.0,
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get fallback counts by feature
    pub fn get_fallbacks(&self) -> HashMap<String, u64> {
        self.fallbacks
            .read()
            .map(|by_feature| by_feature.clone())
            .unwrap_or_default()
    }

    /// Point-in-time view for the `/metrics` endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            throughput: self.get_throughput(),
            mean_price_lakhs: self.get_mean_price(),
            latency: self.get_latency_stats(),
            fallbacks: self.get_fallbacks(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let latency = &snapshot.latency;
        let error_rate = if snapshot.requests > 0 {
            ((snapshot.client_errors + snapshot.inference_errors) as f64 / snapshot.requests as f64)
                * 100.0
        } else {
            0.0
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             PROPERTY PRICE SERVICE - METRICS SUMMARY         ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests: {:>8}  │  Predictions: {:>8}  │  {:>6.1} req/s ║",
            snapshot.requests, snapshot.predictions, snapshot.throughput
        );
        info!(
            "║ Client errors: {:>6}  │  Inference errors: {:>6}  │ {:>5.1}% ║",
            snapshot.client_errors, snapshot.inference_errors, error_rate
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!(
            "║ Mean predicted price: {:>10.2} lakhs                       ║",
            snapshot.mean_price_lakhs
        );
        if !snapshot.fallbacks.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Fallback encodings:                                          ║");
            let mut features: Vec<_> = snapshot.fallbacks.iter().collect();
            features.sort();
            for (feature, count) in features {
                info!("║   {:16}: {:>8}                                  ║", feature, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Serializable counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub predictions: u64,
    pub client_errors: u64,
    pub inference_errors: u64,
    pub throughput: f64,
    pub mean_price_lakhs: f64,
    pub latency: LatencyStats,
    pub fallbacks: HashMap<String, u64>,
}

/// Periodic metrics reporter that logs summaries
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task. Returns at once when the interval is 0.
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if self.metrics.requests.load(Ordering::Relaxed) > 0 {
                self.metrics.print_summary();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_request();
        metrics.record_request();
        metrics.record_request();
        metrics.record_prediction(Duration::from_micros(100), 40.0, &["Locality"]);
        metrics.record_prediction(Duration::from_micros(300), 60.0, &[]);
        metrics.record_failure(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.client_errors, 1);
        assert_eq!(snapshot.inference_errors, 0);
        assert_eq!(snapshot.mean_price_lakhs, 50.0);
        assert_eq!(snapshot.fallbacks.get("Locality"), Some(&1));
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats().count, 0);

        for us in 1..=100 {
            metrics.record_prediction(Duration::from_micros(us), 1.0, &[]);
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert!(stats.p95_us <= stats.p99_us);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ServiceMetrics::new();
        metrics.record_failure(false);
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["inference_errors"], 1);
        assert!(json["latency"]["p95_us"].is_u64());
    }
}
