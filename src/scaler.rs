//! Background scaler keeping the idle count inside the watermark band
//!
//! Two loops tick independently. Top-up reacts to the full deficit on every
//! tick, aiming for the middle of the band; trim removes at most one excess
//! object per tick.

use crate::pool::PoolInner;

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Spawn the top-up and trim loops for a pool.
pub(crate) fn spawn<T: Send + 'static>(pool: &Arc<PoolInner<T>>, handle: &Handle) -> Vec<JoinHandle<()>> {
    let period = pool.scale_interval;
    vec![
        handle.spawn(run_loop(Arc::downgrade(pool), period, "top-up", |pool| {
            top_up(pool);
        })),
        handle.spawn(run_loop(Arc::downgrade(pool), period, "trim", |pool| {
            trim(pool);
        })),
    ]
}

async fn run_loop<T, F>(weak: Weak<PoolInner<T>>, period: Duration, name: &'static str, step: F)
where
    T: Send + 'static,
    F: Fn(&Arc<PoolInner<T>>),
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // Dropping the last pool handle ends the loop.
        let Some(pool) = weak.upgrade() else { break };
        if pool.is_closed() {
            break;
        }
        step(&pool);
    }
    debug!(task = name, "scaler loop exiting");
}

/// Number of objects to create so that idle plus in-flight creations reach
/// the middle of the band.
pub(crate) fn creation_target(min_idle: usize, max_idle: usize, idle: usize, pending: usize) -> usize {
    if idle >= min_idle {
        return 0;
    }
    ((min_idle + max_idle) / 2).saturating_sub(idle + pending)
}

/// One top-up tick. Returns the number of creations launched.
pub(crate) fn top_up<T: Send + 'static>(pool: &Arc<PoolInner<T>>) -> usize {
    let idle = pool.ledger.idle();
    let target = creation_target(pool.min_idle, pool.max_idle, idle, pool.pending());
    if target == 0 {
        return 0;
    }

    let mut launched = 0;
    for _ in 0..target {
        if pool.reserve_creation().is_err() {
            trace!(total = pool.ledger.total(), "pool at capacity, top-up stops");
            break;
        }
        // One task per creation; a slow factory only delays its own object.
        let pool = Arc::clone(pool);
        tokio::spawn(async move {
            if let Err(err) = pool.complete_creation().await {
                pool.report(&err);
            }
        });
        launched += 1;
    }

    debug!(idle, target, launched, "top-up");
    launched
}

/// One trim tick. Returns whether an object was taken out for destruction.
pub(crate) fn trim<T: Send + 'static>(pool: &Arc<PoolInner<T>>) -> bool {
    let idle = pool.ledger.idle();
    if idle <= pool.max_idle {
        return false;
    }

    match pool.pop_ready() {
        Some(obj) => {
            debug!(idle, max_idle = pool.max_idle, "trim");
            pool.spawn_destroy(obj);
            true
        }
        None => false,
    }
}
