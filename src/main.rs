// Demo driver: a steady stream of short-lived borrowers against a served pool.
// Run with: RUST_LOG=adaptive_objectpool=debug cargo run

use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration, PoolError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Connection {
    id: u32,
}

const WORKERS: u64 = 2000;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let next_id = Arc::new(AtomicU32::new(0));
    let factory = FnFactory::new(move || {
        let id = next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(id, "connection created");
        Ok(Connection { id })
    })
    .with_destroy(|conn: Connection| {
        info!(id = conn.id, "connection destroyed");
        Ok(())
    });

    let config = PoolConfiguration::new()
        .with_capacity(1000)
        .with_idle_range(10, 30)
        .with_factory(factory)
        .with_error_handler(|err| warn!(error = %err, "pool background error"));

    let pool = match Pool::new(config) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("invalid pool configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = pool.serve() {
        eprintln!("failed to start pool: {err}");
        std::process::exit(1);
    }

    let mut workers = Vec::new();
    for n in 0..WORKERS {
        let pool = pool.clone();
        workers.push(tokio::spawn(async move {
            match pool.borrow().await {
                Ok(conn) => {
                    info!(
                        worker = n,
                        conn = conn.id,
                        total = pool.total_count(),
                        idle = pool.idle_count(),
                        "borrowed"
                    );
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    pool.give_back(conn);
                }
                Err(err @ (PoolError::PoolEmpty | PoolError::Timeout(_))) => {
                    info!(worker = n, error = %err, "nothing available, giving up");
                }
                Err(err) => warn!(worker = n, error = %err, "borrow failed"),
            }
        }));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    for worker in workers {
        let _ = worker.await;
    }

    // Let the trim loop bring the idle count back into the band.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let health = pool.get_health_status();
    info!(
        total = health.total_objects,
        idle = health.idle_objects,
        utilization = health.utilization,
        "workload finished"
    );
    for (name, value) in pool.export_metrics() {
        info!(metric = %name, %value);
    }

    pool.clean().await;
    info!(remaining = pool.total_count(), "pool drained");
}
