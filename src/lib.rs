//! # Adaptive object pool
//!
//! Bounded, thread-safe pool of reusable objects (connections, buffers, ...)
//! that sizes itself: objects are created lazily up to a capacity, and a
//! background scaler keeps the number of idle objects between a low and a
//! high watermark.
//!
//! ## Features
//!
//! - Lock-free capacity accounting with reserve/release slots
//! - Bounded FIFO ready queue with time-limited borrowing
//! - Background top-up and trim ("grow fast, shrink slow")
//! - Pluggable async object factory with optional validation
//! - RAII guards that validate and return objects on drop
//! - Health status, metrics and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = PoolConfiguration::new()
//!     .with_capacity(3)
//!     .with_idle_range(1, 2)
//!     .with_factory(FnFactory::new(|| Ok(String::from("connection"))));
//!
//! let pool = Pool::new(config).unwrap();
//! pool.serve().unwrap();
//! tokio::time::sleep(Duration::from_millis(50)).await;
//!
//! {
//!     let conn = pool.get_object().await.unwrap();
//!     println!("Got: {}", *conn);
//!     // Object automatically returned when `conn` goes out of scope
//! }
//! # }
//! ```

mod config;
mod errors;
mod factory;
mod health;
mod ledger;
mod metrics;
mod pool;
mod scaler;

pub use config::{
    DEFAULT_BORROW_TIMEOUT, DEFAULT_CAPACITY, DEFAULT_MAX_IDLE, DEFAULT_MIN_IDLE, DEFAULT_SCALE_INTERVAL,
    ErrorHandler, PoolConfiguration,
};
pub use errors::{FactoryError, PoolError, PoolResult};
pub use factory::{FnFactory, ObjectFactory, factory_error};
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Pool, PooledObject};
