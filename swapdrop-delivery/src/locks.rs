//! Per-exchange critical sections.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use swapdrop_core::types::ExchangeId;

/// Hands out one async mutex per exchange.
///
/// Operations on different exchanges never contend; operations on the same
/// exchange, whichever leg they touch, run one at a time. Clones share the
/// same lock table. An entry lives only while someone holds or waits on it.
#[derive(Clone, Debug, Default)]
pub struct ExchangeLocks {
    locks: Arc<DashMap<ExchangeId, Arc<Mutex<()>>>>,
}

/// Holds the lock of one exchange until dropped.
pub struct ExchangeGuard {
    guard: Option<OwnedMutexGuard<()>>,
    exchange_id: ExchangeId,
    locks: ExchangeLocks,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The table's own reference is the last one: nobody holds or waits.
        self.locks
            .locks
            .remove_if(&self.exchange_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for ExchangeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeGuard")
            .field("exchange_id", &self.exchange_id)
            .finish()
    }
}

impl ExchangeLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of `exchange_id`.
    ///
    /// The guard releases the lock when dropped, including when the
    /// holding future is cancelled.
    pub async fn acquire(&self, exchange_id: &ExchangeId) -> ExchangeGuard {
        let lock = self
            .locks
            .entry(exchange_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ExchangeGuard {
            guard: Some(lock.lock_owned().await),
            exchange_id: exchange_id.clone(),
            locks: self.clone(),
        }
    }

    /// Number of exchanges currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no exchange is locked or awaited.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(s: &str) -> ExchangeId {
        ExchangeId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_same_exchange_is_exclusive() {
        let locks = ExchangeLocks::new();
        let guard = locks.acquire(&id("ex-1")).await;

        let contender = locks.clone();
        let blocked = tokio::time::timeout(Duration::from_millis(50), async move {
            contender.acquire(&id("ex-1")).await;
        })
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let _again = locks.acquire(&id("ex-1")).await;
    }

    #[tokio::test]
    async fn test_different_exchanges_do_not_contend() {
        let locks = ExchangeLocks::new();
        let _a = locks.acquire(&id("ex-1")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&id("ex-2"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_entry_lives_while_held_or_awaited() {
        let locks = ExchangeLocks::new();
        let held = locks.acquire(&id("ex-1")).await;
        drop(locks.acquire(&id("ex-2")).await);
        assert_eq!(locks.len(), 1);

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(&id("ex-1")).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = ExchangeLocks::new();
        let held = locks.acquire(&id("ex-1")).await;
        let waited = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&id("ex-1"))).await;
        assert!(waited.is_err());

        drop(held);
        assert!(locks.is_empty());
    }
}
