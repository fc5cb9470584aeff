//! Capacity accounting shared by callers and the scaler

use crate::errors::{PoolError, PoolResult};

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free counters of live and idle objects.
///
/// `total` counts every object that exists or is being created, `idle`
/// counts the objects sitting in the ready queue. A creator claims a slot
/// with [`reserve`](Self::reserve) before calling the factory and hands it
/// back with [`release`](Self::release) if the factory fails, so concurrent
/// creators race for the last free slot without a pool-wide lock.
#[derive(Debug)]
pub(crate) struct CapacityLedger {
    capacity: usize,
    total: AtomicUsize,
    idle: AtomicUsize,
}

impl CapacityLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            total: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim one capacity slot, returning the new total.
    ///
    /// On `PoolFull` the total is left untouched.
    pub fn reserve(&self) -> PoolResult<usize> {
        let capacity = self.capacity;
        self.total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| {
                if total < capacity { Some(total + 1) } else { None }
            })
            .map(|prev| prev + 1)
            .map_err(|_| PoolError::PoolFull)
    }

    /// Give one capacity slot back, returning the new total.
    ///
    /// Fails with `PoolEmpty` instead of going below zero.
    pub fn release(&self) -> PoolResult<usize> {
        self.total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| total.checked_sub(1))
            .map(|prev| prev - 1)
            .map_err(|_| PoolError::PoolEmpty)
    }

    pub fn mark_idle(&self) {
        self.idle.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns false if nothing was counted as idle.
    pub fn mark_active(&self) -> bool {
        self.idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| idle.checked_sub(1))
            .is_ok()
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Acquire)
    }

    /// Objects that exist but are not in the ready queue.
    pub fn active(&self) -> usize {
        let idle = self.idle();
        self.total().saturating_sub(idle)
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_until_full() {
        let ledger = CapacityLedger::new(2);
        assert_eq!(ledger.reserve().unwrap(), 1);
        assert_eq!(ledger.reserve().unwrap(), 2);
        assert!(matches!(ledger.reserve(), Err(PoolError::PoolFull)));
        assert_eq!(ledger.total(), 2);
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn test_release_never_underflows() {
        let ledger = CapacityLedger::new(1);
        assert!(matches!(ledger.release(), Err(PoolError::PoolEmpty)));
        assert_eq!(ledger.total(), 0);

        ledger.reserve().unwrap();
        assert_eq!(ledger.release().unwrap(), 0);
    }

    #[test]
    fn test_idle_accounting() {
        let ledger = CapacityLedger::new(4);
        ledger.reserve().unwrap();
        ledger.reserve().unwrap();
        ledger.mark_idle();
        assert_eq!(ledger.idle(), 1);
        assert_eq!(ledger.active(), 1);

        assert!(ledger.mark_active());
        assert!(!ledger.mark_active());
        assert_eq!(ledger.idle(), 0);
        assert_eq!(ledger.active(), 2);
    }

    #[test]
    fn test_concurrent_reserve_respects_capacity() {
        let ledger = Arc::new(CapacityLedger::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || (0..100).filter(|_| ledger.reserve().is_ok()).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
        assert_eq!(ledger.total(), 50);
    }

    proptest! {
        #[test]
        fn ledger_total_stays_within_capacity(
            capacity in 1usize..16,
            ops in proptest::collection::vec(any::<bool>(), 1..64),
        ) {
            let ledger = CapacityLedger::new(capacity);
            let mut model = 0usize;

            for reserve in ops {
                let before = ledger.total();
                if reserve {
                    match ledger.reserve() {
                        Ok(total) => {
                            model += 1;
                            prop_assert_eq!(total, model);
                        }
                        Err(_) => prop_assert_eq!(ledger.total(), before),
                    }
                } else {
                    match ledger.release() {
                        Ok(total) => {
                            model -= 1;
                            prop_assert_eq!(total, model);
                        }
                        Err(_) => prop_assert_eq!(before, 0),
                    }
                }
                prop_assert!(ledger.total() <= capacity);
                prop_assert_eq!(ledger.total(), model);
            }
        }
    }
}
