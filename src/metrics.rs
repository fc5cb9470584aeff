//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};

/// Snapshot of pool counters
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = PoolConfiguration::new()
///     .with_capacity(4)
///     .with_idle_range(0, 4)
///     .with_factory(FnFactory::new(|| Ok(1u32)));
/// let pool = Pool::new(config).unwrap();
/// pool.add(2).await.unwrap();
///
/// let obj = pool.borrow().await.unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 2);
/// assert_eq!(metrics.total_borrowed, 1);
/// assert_eq!(metrics.active_objects, 1);
/// pool.give_back(obj);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Successful borrows
    pub total_borrowed: usize,

    /// Objects handed back to the ready queue
    pub total_returned: usize,

    /// Objects built by the factory
    pub total_created: usize,

    /// Objects torn down by the factory
    pub total_destroyed: usize,

    /// Failed factory creations
    pub creation_failures: usize,

    /// Failed factory destructions
    pub destruction_failures: usize,

    /// Borrows rejected because nothing could become available
    pub pool_empty_events: usize,

    /// Borrows that gave up waiting
    pub timeout_events: usize,

    /// Live objects
    pub total_objects: usize,

    /// Objects in the ready queue
    pub idle_objects: usize,

    /// Objects held by borrowers or in flight
    pub active_objects: usize,

    /// Pool utilization ratio (0.0 to 1.0)
    pub utilization: f64,

    /// Maximum pool capacity
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("destruction_failures".to_string(), self.destruction_failures.to_string());
        metrics.insert("pool_empty_events".to_string(), self.pool_empty_events.to_string());
        metrics.insert("timeout_events".to_string(), self.timeout_events.to_string());
        metrics.insert("total_objects".to_string(), self.total_objects.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// Every series carries a `pool` label plus the given tags.
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());
        let registry = Registry::new();

        let gauges = [
            ("objectpool_objects_total", "Current live objects", metrics.total_objects),
            ("objectpool_objects_idle", "Current idle objects", metrics.idle_objects),
            ("objectpool_objects_active", "Current active objects", metrics.active_objects),
            ("objectpool_capacity", "Maximum live objects", metrics.max_capacity),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(metrics_error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(metrics_error)?;
        }

        let utilization =
            Gauge::with_opts(opts("objectpool_utilization", "Pool utilization ratio")).map_err(metrics_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(metrics_error)?;

        let counters = [
            ("objectpool_objects_borrowed_total", "Total objects borrowed", metrics.total_borrowed),
            ("objectpool_objects_returned_total", "Total objects returned", metrics.total_returned),
            ("objectpool_objects_created_total", "Total objects created", metrics.total_created),
            ("objectpool_objects_destroyed_total", "Total objects destroyed", metrics.total_destroyed),
            ("objectpool_creation_failures_total", "Failed object creations", metrics.creation_failures),
            ("objectpool_destruction_failures_total", "Failed object destructions", metrics.destruction_failures),
            ("objectpool_events_empty_total", "Pool empty events", metrics.pool_empty_events),
            ("objectpool_events_timeout_total", "Borrow timeouts", metrics.timeout_events),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(metrics_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(metrics_error)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(metrics_error)
    }
}

#[cfg(feature = "metrics")]
fn metrics_error(err: impl std::fmt::Display) -> PoolError {
    PoolError::Metrics(err.to_string())
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_borrowed: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub destruction_failures: AtomicUsize,
    pub pool_empty_events: AtomicUsize,
    pub timeout_events: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, total: usize, idle: usize, capacity: usize) -> PoolMetrics {
        let active = total.saturating_sub(idle);
        let utilization = if capacity > 0 {
            active as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            destruction_failures: self.destruction_failures.load(Ordering::Relaxed),
            pool_empty_events: self.pool_empty_events.load(Ordering::Relaxed),
            timeout_events: self.timeout_events.load(Ordering::Relaxed),
            total_objects: total,
            idle_objects: idle,
            active_objects: active,
            utilization,
            max_capacity: capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_derives_active_and_utilization() {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.total_created);
        MetricsTracker::incr(&tracker.total_created);

        let metrics = tracker.get_metrics(4, 1, 8);
        assert_eq!(metrics.total_created, 2);
        assert_eq!(metrics.active_objects, 3);
        assert!((metrics.utilization - 0.375).abs() < f64::EPSILON);
        assert_eq!(metrics.export()["active_objects"], "3");
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_export() {
        let metrics = MetricsTracker::new().get_metrics(3, 1, 10);
        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "api".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "conns", Some(&tags)).unwrap();
        assert!(output.contains("# TYPE objectpool_objects_active gauge"));
        assert!(output.contains("pool=\"conns\""));
        assert!(output.contains("service=\"api\""));
        assert!(output.contains("objectpool_objects_borrowed_total"));
    }
}
