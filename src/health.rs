//! Health monitoring for object pools

/// Utilization above which a pool is reported unhealthy.
const HIGH_UTILIZATION: f64 = 0.9;

/// Health status of an object pool
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration};
///
/// let config = PoolConfiguration::new()
///     .with_capacity(8)
///     .with_idle_range(2, 4)
///     .with_factory(FnFactory::new(|| Ok(0u8)));
/// let pool = Pool::new(config).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert!(!health.is_serving);
/// assert_eq!(health.warning_count, 2);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Whether the scaler is running
    pub is_serving: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Live objects
    pub total_objects: usize,

    /// Idle objects count
    pub idle_objects: usize,

    /// Active objects count
    pub active_objects: usize,

    /// Total capacity
    pub total_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn new(
        total: usize,
        idle: usize,
        capacity: usize,
        min_idle: usize,
        is_serving: bool,
    ) -> Self {
        let active = total.saturating_sub(idle);
        let utilization = if capacity > 0 {
            active as f64 / capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > HIGH_UTILIZATION {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        // Below the band while there is still room to grow.
        if idle < min_idle && total < capacity {
            warnings.push(format!("Idle objects below minimum: {} < {}", idle, min_idle));
        }

        if !is_serving {
            warnings.push("Scaler is not running".to_string());
        }

        Self {
            is_healthy,
            is_serving,
            warning_count: warnings.len(),
            utilization,
            total_objects: total,
            idle_objects: idle,
            active_objects: active,
            total_capacity: capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
