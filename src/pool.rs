//! Core pool engine: borrow, return and destroy over a bounded ready queue

use crate::config::{ErrorHandler, PoolConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::factory::ObjectFactory;
use crate::health::HealthStatus;
use crate::ledger::CapacityLedger;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::scaler;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// A borrowed object that goes back to the pool when dropped
///
/// On drop the factory's `validate` decides its fate: objects that pass
/// are returned to the ready queue, objects that fail are destroyed in the
/// background.
pub struct PooledObject<T: Send + 'static> {
    value: Option<T>,
    pool: Weak<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    fn new(value: T, pool: Weak<PoolInner<T>>) -> Self {
        Self {
            value: Some(value),
            pool,
        }
    }

    /// Take the object out of the pool for good.
    ///
    /// Its capacity slot is released; the caller becomes responsible for
    /// tearing it down.
    pub fn detach(mut self) -> T {
        let value = self.value.take().expect("Value already taken");
        if let Some(pool) = self.pool.upgrade()
            && let Err(err) = pool.ledger.release()
        {
            pool.report(&err);
        }
        value
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take()
            && let Some(pool) = self.pool.upgrade()
        {
            pool.recycle(value);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject").field("value", &self.value).finish()
    }
}

/// State shared between pool handles, the scaler loops and background tasks
pub(crate) struct PoolInner<T: Send + 'static> {
    ready: ArrayQueue<T>,
    ready_signal: Notify,
    pub(crate) ledger: CapacityLedger,
    pending: AtomicUsize,
    factory: Arc<dyn ObjectFactory<T>>,
    on_error: Option<ErrorHandler>,
    pub(crate) min_idle: usize,
    pub(crate) max_idle: usize,
    borrow_timeout: Duration,
    pub(crate) scale_interval: Duration,
    metrics: MetricsTracker,
    serving: AtomicBool,
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> PoolInner<T> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Creations that hold a reserved slot but have not produced an object yet.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Pop an idle object, moving it to the active side of the ledger.
    pub(crate) fn pop_ready(&self) -> Option<T> {
        let obj = self.ready.pop()?;
        self.ledger.mark_active();
        Some(obj)
    }

    fn push_ready(&self, obj: T) {
        // Counted before the push so `idle` never trails a visible object.
        self.ledger.mark_idle();
        if self.ready.push(obj).is_err() {
            // Only reachable when an object that never belonged to this pool is returned.
            self.ledger.mark_active();
            warn!("ready queue is full, dropping returned object");
            self.report(&PoolError::PoolFull);
            return;
        }
        self.ready_signal.notify_one();
    }

    fn try_borrow(&self) -> Option<T> {
        let obj = self.pop_ready()?;
        MetricsTracker::incr(&self.metrics.total_borrowed);
        Some(obj)
    }

    async fn borrow(&self) -> PoolResult<T> {
        // Nothing idle: no object can show up in the queue for us.
        if self.ledger.active() >= self.ledger.total() {
            MetricsTracker::incr(&self.metrics.pool_empty_events);
            return Err(PoolError::PoolEmpty);
        }

        if let Some(obj) = self.try_borrow() {
            return Ok(obj);
        }

        let wait = async {
            loop {
                let notified = self.ready_signal.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if let Some(obj) = self.try_borrow() {
                    return obj;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(self.borrow_timeout, wait).await {
            Ok(obj) => Ok(obj),
            Err(_) => {
                MetricsTracker::incr(&self.metrics.timeout_events);
                trace!(timeout = ?self.borrow_timeout, "borrow timed out");
                Err(PoolError::Timeout(self.borrow_timeout))
            }
        }
    }

    fn give_back(&self, obj: T) {
        self.push_ready(obj);
        MetricsTracker::incr(&self.metrics.total_returned);
    }

    async fn destroy(&self, obj: T) -> PoolResult<()> {
        let released = self.ledger.release();
        let destroyed = self.factory.destroy(obj).await;
        released?;

        match destroyed {
            Ok(()) => {
                MetricsTracker::incr(&self.metrics.total_destroyed);
                Ok(())
            }
            Err(err) => {
                MetricsTracker::incr(&self.metrics.destruction_failures);
                Err(PoolError::Factory(err))
            }
        }
    }

    /// Claim a slot for an object that is about to be created.
    pub(crate) fn reserve_creation(&self) -> PoolResult<()> {
        self.ledger.reserve()?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Run the factory for a slot claimed by [`reserve_creation`](Self::reserve_creation).
    ///
    /// On success the object enters the ready queue; on failure the slot
    /// is released again.
    pub(crate) async fn complete_creation(&self) -> PoolResult<()> {
        match self.factory.create().await {
            Ok(obj) => {
                MetricsTracker::incr(&self.metrics.total_created);
                // Idle first, then pending, so the scaler never sees the object missing from both.
                self.push_ready(obj);
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Ok(())
            }
            Err(err) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                MetricsTracker::incr(&self.metrics.creation_failures);
                self.release_reserved().await;
                Err(PoolError::Factory(err))
            }
        }
    }

    async fn release_reserved(&self) {
        // The slot must come back, retry until it does.
        while let Err(err) = self.ledger.release() {
            warn!(error = %err, "failed to release reserved slot, retrying");
            tokio::task::yield_now().await;
        }
    }

    /// Destroy an object on a background task.
    pub(crate) fn spawn_destroy(self: &Arc<Self>, obj: T) {
        match Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(self);
                handle.spawn(async move {
                    if let Err(err) = pool.destroy(obj).await {
                        pool.report(&err);
                    }
                });
            }
            Err(_) => {
                warn!("no async runtime available, dropping object without destroying it");
                if let Err(err) = self.ledger.release() {
                    self.report(&err);
                }
                drop(obj);
            }
        }
    }

    fn recycle(self: &Arc<Self>, obj: T) {
        match self.factory.validate(&obj) {
            Ok(()) => self.give_back(obj),
            Err(err) => {
                debug!(error = %err, "validation failed, destroying object");
                self.spawn_destroy(obj);
            }
        }
    }

    /// Hand a background failure to the error handler.
    pub(crate) fn report(&self, err: &PoolError) {
        warn!(error = %err, "background pool operation failed");
        if let Some(ref handler) = self.on_error {
            handler(err);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Bounded object pool that keeps its idle objects between two watermarks
///
/// Objects are created lazily up to `capacity`. Once [`serve`](Self::serve)
/// has been called, a background scaler tops the ready queue up whenever
/// fewer than `min_idle` objects are idle and trims it, one object per tick,
/// while more than `max_idle` are idle.
///
/// Handles are cheap to clone and all share the same pool.
///
/// # Examples
///
/// ```
/// use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = PoolConfiguration::new()
///     .with_capacity(8)
///     .with_idle_range(2, 4)
///     .with_factory(FnFactory::new(|| Ok(Vec::<u8>::with_capacity(1024))));
///
/// let pool = Pool::new(config).unwrap();
/// pool.add(2).await.unwrap();
///
/// let buf = pool.borrow().await.unwrap();
/// assert_eq!(pool.active_count(), 1);
/// pool.give_back(buf);
/// assert_eq!(pool.idle_count(), 2);
/// # }
/// ```
pub struct Pool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("total", &self.total_count())
            .field("idle", &self.idle_count())
            .field("min_idle", &self.inner.min_idle)
            .field("max_idle", &self.inner.max_idle)
            .field("serving", &self.is_serving())
            .finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Create an empty pool; nothing is created until `serve` or `add`
    pub fn new(config: PoolConfiguration<T>) -> PoolResult<Self> {
        config.validate()?;
        let capacity = config.effective_capacity();
        let factory = config
            .factory
            .ok_or_else(|| PoolError::invalid_options("factory is missing"))?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                ready: ArrayQueue::new(capacity),
                ready_signal: Notify::new(),
                ledger: CapacityLedger::new(capacity),
                pending: AtomicUsize::new(0),
                factory,
                on_error: config.on_error,
                min_idle: config.min_idle,
                max_idle: config.max_idle,
                borrow_timeout: config.borrow_timeout,
                scale_interval: config.scale_interval,
                metrics: MetricsTracker::new(),
                serving: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Start the background scaler
    ///
    /// Only the first call starts anything; later calls return `Ok(())`
    /// without spawning. Must be called from within a Tokio runtime.
    pub fn serve(&self) -> PoolResult<()> {
        let handle = Handle::try_current()
            .map_err(|_| PoolError::invalid_options("serve must be called within a Tokio runtime"))?;

        if self.inner.is_closed()
            || self
                .inner
                .serving
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Ok(());
        }

        let tasks = scaler::spawn(&self.inner, &handle);
        self.inner.tasks.lock().extend(tasks);
        debug!(
            capacity = self.capacity(),
            min_idle = self.inner.min_idle,
            max_idle = self.inner.max_idle,
            "pool scaler started"
        );
        Ok(())
    }

    /// Whether the scaler is running
    pub fn is_serving(&self) -> bool {
        self.inner.serving.load(Ordering::Acquire) && !self.inner.is_closed()
    }

    /// Borrow an idle object
    ///
    /// Fails fast with `PoolEmpty` when no object is idle. Otherwise waits up
    /// to the configured borrow timeout for the ready queue and fails with
    /// `Timeout` if nothing arrives, leaving all counters unchanged.
    pub async fn borrow(&self) -> PoolResult<T> {
        self.inner.borrow().await
    }

    /// Borrow an idle object without waiting
    pub fn try_borrow(&self) -> Option<T> {
        self.inner.try_borrow()
    }

    /// Borrow an object wrapped in a guard that returns it on drop
    pub async fn get_object(&self) -> PoolResult<PooledObject<T>> {
        let obj = self.inner.borrow().await?;
        Ok(PooledObject::new(obj, Arc::downgrade(&self.inner)))
    }

    /// Put a borrowed object back into the ready queue
    ///
    /// No validation happens here. Callers that need it should check
    /// [`validate`](Self::validate) first and [`destroy`](Self::destroy)
    /// objects that fail.
    pub fn give_back(&self, obj: T) {
        self.inner.give_back(obj);
    }

    /// Destroy a borrowed object and free its capacity slot
    ///
    /// The object must not be sitting in the ready queue.
    pub async fn destroy(&self, obj: T) -> PoolResult<()> {
        self.inner.destroy(obj).await
    }

    /// Run the factory's validation on an object
    pub fn validate(&self, obj: &T) -> PoolResult<()> {
        self.inner.factory.validate(obj).map_err(PoolError::Factory)
    }

    /// Create `count` objects and put them in the ready queue
    ///
    /// Rejected with `InvalidOptions` if `count` exceeds the remaining
    /// capacity. Objects are created one after another; if the factory
    /// fails, the objects created so far stay in the pool and the error is
    /// returned.
    pub async fn add(&self, count: usize) -> PoolResult<()> {
        let remaining = self.inner.ledger.remaining();
        if count > remaining {
            return Err(PoolError::invalid_options(format!(
                "cannot add {} objects, only {} slots left",
                count, remaining
            )));
        }

        for _ in 0..count {
            self.inner.reserve_creation()?;
            self.inner.complete_creation().await?;
        }
        Ok(())
    }

    /// Stop the scaler and destroy every idle object
    ///
    /// Objects still held by borrowers are left alone. Not meant to run
    /// alongside regular borrow traffic.
    pub async fn clean(&self) {
        self.shutdown();

        while self.total_count() > 0 {
            match self.inner.borrow().await {
                Ok(obj) => {
                    if let Err(err) = self.inner.destroy(obj).await {
                        self.inner.report(&err);
                    }
                }
                Err(PoolError::Timeout(_)) => continue,
                Err(_) if self.inner.pending() > 0 => {
                    tokio::time::sleep(self.inner.scale_interval).await;
                }
                Err(_) => break,
            }
        }
        debug!(remaining = self.total_count(), "pool cleaned");
    }

    /// Stop the scaler; borrowing and returning keep working
    pub fn shutdown(&self) {
        if !self.inner.is_closed() {
            debug!("pool scaler stopping");
        }
        self.inner.shutdown();
    }

    /// Number of live objects
    pub fn total_count(&self) -> usize {
        self.inner.ledger.total()
    }

    /// Number of objects in the ready queue
    pub fn idle_count(&self) -> usize {
        self.inner.ledger.idle()
    }

    /// Number of live objects outside the ready queue
    pub fn active_count(&self) -> usize {
        self.inner.ledger.active()
    }

    /// Maximum number of live objects
    pub fn capacity(&self) -> usize {
        self.inner.ledger.capacity()
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::new(
            self.total_count(),
            self.idle_count(),
            self.capacity(),
            self.inner.min_idle,
            self.is_serving(),
        )
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.inner
            .metrics
            .get_metrics(self.total_count(), self.idle_count(), self.capacity())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<PoolInner<T>> {
        &self.inner
    }
}
