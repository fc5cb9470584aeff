//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Capacity used when the configured capacity is zero.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Default lower idle watermark.
pub const DEFAULT_MIN_IDLE: usize = 32;

/// Default upper idle watermark.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Default time a borrower waits on the ready queue.
pub const DEFAULT_BORROW_TIMEOUT: Duration = Duration::from_millis(10);

/// Default tick of the background scaler.
pub const DEFAULT_SCALE_INTERVAL: Duration = Duration::from_millis(10);

/// Callback receiving errors raised by background tasks.
pub type ErrorHandler = Arc<dyn Fn(&PoolError) + Send + Sync>;

/// Configuration for pool sizing and behavior
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::{FnFactory, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_capacity(100)
///     .with_idle_range(10, 30)
///     .with_borrow_timeout(Duration::from_millis(50))
///     .with_factory(FnFactory::new(|| Ok(0u64)));
///
/// assert_eq!(config.capacity, 100);
/// assert_eq!(config.min_idle, 10);
/// assert_eq!(config.max_idle, 30);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T: Send + 'static> {
    /// Maximum number of live objects; zero selects [`DEFAULT_CAPACITY`]
    pub capacity: usize,

    /// Idle count below which the scaler creates objects
    pub min_idle: usize,

    /// Idle count above which the scaler destroys objects
    pub max_idle: usize,

    /// How long `borrow` waits for a ready object
    pub borrow_timeout: Duration,

    /// Tick of the top-up and trim loops
    pub scale_interval: Duration,

    /// Object factory, required
    pub factory: Option<Arc<dyn ObjectFactory<T>>>,

    /// Receives failures of background creation and destruction.
    /// Without one those failures are only logged.
    pub on_error: Option<ErrorHandler>,
}

impl<T: Send + 'static> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            min_idle: DEFAULT_MIN_IDLE,
            max_idle: DEFAULT_MAX_IDLE,
            borrow_timeout: DEFAULT_BORROW_TIMEOUT,
            scale_interval: DEFAULT_SCALE_INTERVAL,
            factory: None,
            on_error: None,
        }
    }
}

impl<T: Send + 'static> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            min_idle: self.min_idle,
            max_idle: self.max_idle,
            borrow_timeout: self.borrow_timeout,
            scale_interval: self.scale_interval,
            factory: self.factory.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("capacity", &self.capacity)
            .field("min_idle", &self.min_idle)
            .field("max_idle", &self.max_idle)
            .field("borrow_timeout", &self.borrow_timeout)
            .field("scale_interval", &self.scale_interval)
            .field("has_factory", &self.factory.is_some())
            .field("has_error_handler", &self.on_error.is_some())
            .finish()
    }
}

impl<T: Send + 'static> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live objects
    ///
    /// Watermarks above the new capacity are lowered to it, so a small pool
    /// built on the default watermarks stays valid. Call
    /// [`with_idle_range`](Self::with_idle_range) afterwards to pick them
    /// explicitly.
    ///
    /// # Examples
    ///
    /// ```
    /// use adaptive_objectpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u8>::new().with_capacity(10);
    ///
    /// assert_eq!((config.min_idle, config.max_idle), (10, 10));
    /// ```
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        let capacity = self.effective_capacity();
        self.max_idle = self.max_idle.min(capacity);
        self.min_idle = self.min_idle.min(self.max_idle);
        self
    }

    /// Set the idle watermarks
    ///
    /// # Examples
    ///
    /// ```
    /// use adaptive_objectpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u8>::new().with_idle_range(1, 2);
    ///
    /// assert_eq!((config.min_idle, config.max_idle), (1, 2));
    /// ```
    pub fn with_idle_range(mut self, min_idle: usize, max_idle: usize) -> Self {
        self.min_idle = min_idle;
        self.max_idle = max_idle;
        self
    }

    /// Set the borrow timeout
    pub fn with_borrow_timeout(mut self, timeout: Duration) -> Self {
        self.borrow_timeout = timeout;
        self
    }

    /// Set the scaler tick
    pub fn with_scale_interval(mut self, interval: Duration) -> Self {
        self.scale_interval = interval;
        self
    }

    /// Set the object factory
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: ObjectFactory<T> + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Set the background error handler
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PoolError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Capacity after applying the zero default
    pub fn effective_capacity(&self) -> usize {
        if self.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity
        }
    }

    /// Check the options for consistency
    ///
    /// # Examples
    ///
    /// ```
    /// use adaptive_objectpool::{FnFactory, PoolConfiguration, PoolError};
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_capacity(10)
    ///     .with_idle_range(5, 2)
    ///     .with_factory(FnFactory::new(|| Ok(1u8)));
    ///
    /// assert!(matches!(config.validate(), Err(PoolError::InvalidOptions(_))));
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.factory.is_none() {
            return Err(PoolError::invalid_options("factory is missing"));
        }

        let capacity = self.effective_capacity();
        if self.min_idle > self.max_idle {
            return Err(PoolError::invalid_options(format!(
                "min_idle ({}) is greater than max_idle ({})",
                self.min_idle, self.max_idle
            )));
        }
        if self.max_idle > capacity {
            return Err(PoolError::invalid_options(format!(
                "max_idle ({}) is greater than capacity ({})",
                self.max_idle, capacity
            )));
        }
        if self.scale_interval.is_zero() {
            return Err(PoolError::invalid_options("scale_interval must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::FnFactory;

    fn with_factory(config: PoolConfiguration<u32>) -> PoolConfiguration<u32> {
        config.with_factory(FnFactory::new(|| Ok(1)))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = with_factory(PoolConfiguration::new());
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.min_idle, DEFAULT_MIN_IDLE);
        assert_eq!(config.borrow_timeout, DEFAULT_BORROW_TIMEOUT);
    }

    #[test]
    fn test_missing_factory() {
        let config = PoolConfiguration::<u32>::new();
        assert!(matches!(config.validate(), Err(PoolError::InvalidOptions(_))));
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let config = with_factory(PoolConfiguration::new().with_capacity(0));
        assert_eq!(config.effective_capacity(), DEFAULT_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_small_capacity_lowers_default_watermarks() {
        let config = with_factory(PoolConfiguration::new().with_capacity(10));
        assert_eq!((config.min_idle, config.max_idle), (10, 10));
        assert!(config.validate().is_ok());

        let config = with_factory(PoolConfiguration::new().with_capacity(40));
        assert_eq!((config.min_idle, config.max_idle), (DEFAULT_MIN_IDLE, 40));
        assert!(config.validate().is_ok());

        let config = with_factory(PoolConfiguration::new().with_capacity(0));
        assert_eq!((config.min_idle, config.max_idle), (DEFAULT_MIN_IDLE, DEFAULT_MAX_IDLE));
    }

    #[test]
    fn test_watermark_ordering() {
        let config = with_factory(PoolConfiguration::new().with_capacity(10).with_idle_range(4, 3));
        assert!(matches!(config.validate(), Err(PoolError::InvalidOptions(_))));

        let config = with_factory(PoolConfiguration::new().with_capacity(10).with_idle_range(3, 11));
        assert!(matches!(config.validate(), Err(PoolError::InvalidOptions(_))));

        let config = with_factory(PoolConfiguration::new().with_capacity(10).with_idle_range(10, 10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_scale_interval() {
        let config = with_factory(
            PoolConfiguration::new()
                .with_capacity(10)
                .with_idle_range(1, 2)
                .with_scale_interval(Duration::ZERO),
        );
        assert!(config.validate().is_err());
    }
}
