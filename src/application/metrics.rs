use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// In-process request counters, keyed by `METHOD route`.
#[derive(Debug)]
pub struct RequestMetrics {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    since: DateTime<Utc>,
    total: u64,
    successful: u64,
    failed: u64,
    by_endpoint: BTreeMap<String, EndpointStats>,
}

impl MetricsInner {
    fn empty() -> Self {
        Self {
            since: Utc::now(),
            total: 0,
            successful: 0,
            failed: 0,
            by_endpoint: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub avg_response_ms: f64,
    pub min_response_ms: f64,
    pub max_response_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub since: DateTime<Utc>,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub by_endpoint: BTreeMap<String, EndpointStats>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MetricsInner::empty()),
        }
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses below 400 count as successful.
    pub fn record(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let succeeded = status < 400;
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let mut inner = self.lock();

        inner.total += 1;
        if succeeded {
            inner.successful += 1;
        } else {
            inner.failed += 1;
        }

        let stats = inner
            .by_endpoint
            .entry(format!("{method} {route}"))
            .or_insert(EndpointStats {
                total: 0,
                successful: 0,
                failed: 0,
                avg_response_ms: 0.0,
                min_response_ms: f64::INFINITY,
                max_response_ms: 0.0,
            });
        stats.total += 1;
        if succeeded {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
        let count = stats.total as f64;
        stats.avg_response_ms = (stats.avg_response_ms * (count - 1.0) + elapsed_ms) / count;
        stats.min_response_ms = stats.min_response_ms.min(elapsed_ms);
        stats.max_response_ms = stats.max_response_ms.max(elapsed_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.lock();
        let success_rate = if inner.total == 0 {
            0.0
        } else {
            inner.successful as f64 / inner.total as f64 * 100.0
        };

        MetricsSnapshot {
            since: inner.since,
            total: inner.total,
            successful: inner.successful,
            failed: inner.failed,
            success_rate,
            by_endpoint: inner.by_endpoint.clone(),
        }
    }

    pub fn reset(&self) {
        *self.lock() = MetricsInner::empty();
    }

    fn lock(&self) -> MutexGuard<'_, MetricsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_totals_and_latency_bounds() {
        let metrics = RequestMetrics::new();
        metrics.record("GET", "/health", 200, Duration::from_millis(10));
        metrics.record("GET", "/health", 200, Duration::from_millis(30));
        metrics.record("POST", "/api/user/search", 400, Duration::from_millis(5));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.successful, 2);
        assert_eq!(snapshot.failed, 1);

        let health = &snapshot.by_endpoint["GET /health"];
        assert_eq!(health.total, 2);
        assert!((health.avg_response_ms - 20.0).abs() < 1e-6);
        assert!((health.min_response_ms - 10.0).abs() < 1e-6);
        assert!((health.max_response_ms - 30.0).abs() < 1e-6);
        assert_eq!(snapshot.by_endpoint["POST /api/user/search"].failed, 1);
    }

    #[test]
    fn reset_clears_counters() {
        let metrics = RequestMetrics::new();
        metrics.record("GET", "/", 200, Duration::from_millis(1));
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.by_endpoint.is_empty());
        assert_eq!(snapshot.success_rate, 0.0);
    }
}
