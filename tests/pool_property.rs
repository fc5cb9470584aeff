//! Property tests for ledger invariants under arbitrary borrow/return/destroy/add
//! sequences: `0 <= idle <= total <= capacity` after every step.

use adaptive_objectpool::{FnFactory, Pool, PoolConfiguration, PoolError};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Borrow,
    GiveBack,
    Destroy,
    Add(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Borrow),
        2 => Just(Op::GiveBack),
        1 => Just(Op::Destroy),
        1 => (0usize..4).prop_map(Op::Add),
    ]
}

fn pool(capacity: usize) -> Pool<u64> {
    let next = Arc::new(AtomicU64::new(0));
    let config = PoolConfiguration::new()
        .with_capacity(capacity)
        .with_idle_range(0, capacity)
        .with_borrow_timeout(Duration::from_millis(1))
        .with_factory(FnFactory::new(move || Ok(next.fetch_add(1, Ordering::SeqCst))));
    Pool::new(config).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn pool_counters_stay_consistent(
        capacity in 1usize..8,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let pool = pool(capacity);
            let mut held: Vec<u64> = Vec::new();

            for op in &ops {
                let (total, idle) = (pool.total_count(), pool.idle_count());

                match op {
                    Op::Borrow => match pool.borrow().await {
                        Ok(obj) => {
                            prop_assert!(!held.contains(&obj), "object {} handed out twice", obj);
                            prop_assert_eq!(pool.idle_count(), idle - 1);
                            prop_assert_eq!(pool.total_count(), total);
                            held.push(obj);
                        }
                        Err(err) => {
                            prop_assert!(matches!(err, PoolError::PoolEmpty));
                            prop_assert_eq!(idle, 0);
                        }
                    },
                    Op::GiveBack => {
                        if let Some(obj) = held.pop() {
                            pool.give_back(obj);
                            prop_assert_eq!(pool.idle_count(), idle + 1);
                        }
                    }
                    Op::Destroy => {
                        if let Some(obj) = held.pop() {
                            pool.destroy(obj).await.unwrap();
                            prop_assert_eq!(pool.total_count(), total - 1);
                            prop_assert_eq!(pool.idle_count(), idle);
                        }
                    }
                    Op::Add(n) => {
                        let result = pool.add(*n).await;
                        if *n > capacity - total {
                            prop_assert!(matches!(result, Err(PoolError::InvalidOptions(_))));
                            prop_assert_eq!(pool.total_count(), total);
                        } else {
                            prop_assert!(result.is_ok());
                            prop_assert_eq!(pool.total_count(), total + n);
                        }
                    }
                }

                let (total, idle, active) = (pool.total_count(), pool.idle_count(), pool.active_count());
                prop_assert!(idle <= total, "idle {} > total {}", idle, total);
                prop_assert!(total <= capacity, "total {} > capacity {}", total, capacity);
                prop_assert_eq!(active, total - idle);
                prop_assert_eq!(active, held.len());
            }

            let unique: HashSet<_> = held.iter().collect();
            prop_assert_eq!(unique.len(), held.len());
            Ok(())
        })?;
    }
}
