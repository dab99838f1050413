//! In-memory exchange store.
//!
//! Fast, thread-safe storage suitable for development, testing,
//! and single-process deployments.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::ExchangeStore;
use swapdrop_core::types::{Exchange, ExchangeId};

/// In-memory exchange store.
///
/// Version checks and writes happen under the map's shard lock, so
/// concurrent saves of the same exchange cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryExchangeStore {
    exchanges: DashMap<ExchangeId, Exchange>,
}

impl MemoryExchangeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored exchanges.
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Returns a copy of every stored exchange (for export/snapshot).
    pub fn all_exchanges(&self) -> Vec<Exchange> {
        let mut all: Vec<Exchange> = self.exchanges.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Loads exchanges as-is, keeping their versions. Replaces existing entries.
    pub fn import(&self, exchanges: Vec<Exchange>) -> usize {
        let count = exchanges.len();
        for exchange in exchanges {
            self.exchanges.insert(exchange.id.clone(), exchange);
        }
        count
    }

    /// Puts back a previous record, or removes the entry when there was none.
    pub(crate) fn restore(&self, id: &ExchangeId, previous: Option<Exchange>) {
        match previous {
            Some(exchange) => {
                self.exchanges.insert(id.clone(), exchange);
            }
            None => {
                self.exchanges.remove(id);
            }
        }
    }

    pub(crate) fn get(&self, id: &ExchangeId) -> Option<Exchange> {
        self.exchanges.get(id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl ExchangeStore for MemoryExchangeStore {
    #[instrument(skip_all, fields(exchange_id = %exchange.id))]
    async fn insert_exchange(&self, mut exchange: Exchange) -> Result<Exchange> {
        match self.exchanges.entry(exchange.id.clone()) {
            Entry::Occupied(_) => Err(SwapError::DuplicateExchange(exchange.id.to_string())),
            Entry::Vacant(slot) => {
                exchange.version = 1;
                slot.insert(exchange.clone());
                debug!("exchange inserted");
                Ok(exchange)
            }
        }
    }

    async fn load_exchange(&self, id: &ExchangeId) -> Result<Option<Exchange>> {
        Ok(self.get(id))
    }

    #[instrument(skip_all, fields(exchange_id = %exchange.id, version = exchange.version))]
    async fn save_exchange(&self, mut exchange: Exchange) -> Result<Exchange> {
        let mut stored = self
            .exchanges
            .get_mut(&exchange.id)
            .ok_or_else(|| SwapError::ExchangeNotFound(exchange.id.to_string()))?;

        if stored.version != exchange.version {
            return Err(SwapError::VersionConflict {
                expected: exchange.version,
                actual: stored.version,
            });
        }

        exchange.version += 1;
        *stored = exchange.clone();
        debug!(new_version = exchange.version, "exchange saved");
        Ok(exchange)
    }

    async fn list_exchanges(&self) -> Result<Vec<ExchangeId>> {
        let mut ids: Vec<ExchangeId> = self.exchanges.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::exchange;
    use super::*;
    use chrono::Utc;
    use swapdrop_core::types::{LegStatus, PartyId};

    #[tokio::test]
    async fn test_insert_sets_version_one() {
        let store = MemoryExchangeStore::new();
        let stored = store.insert_exchange(exchange("ex-1")).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryExchangeStore::new();
        store.insert_exchange(exchange("ex-1")).await.unwrap();
        let err = store.insert_exchange(exchange("ex-1")).await.unwrap_err();
        assert!(matches!(err, SwapError::DuplicateExchange(_)));
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let store = MemoryExchangeStore::new();
        let mut ex = store.insert_exchange(exchange("ex-1")).await.unwrap();

        let leg_id = ex.leg_a.id;
        ex.leg_mut(leg_id)
            .unwrap()
            .ship(&PartyId::new("alice").unwrap(), "TRK-1", Utc::now())
            .unwrap();
        let saved = store.save_exchange(ex).await.unwrap();
        assert_eq!(saved.version, 2);

        let loaded = store.load_exchange(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.leg_a.status(), LegStatus::Shipped);
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = MemoryExchangeStore::new();
        let first = store.insert_exchange(exchange("ex-1")).await.unwrap();
        let stale = first.clone();

        store.save_exchange(first).await.unwrap();
        let err = store.save_exchange(stale).await.unwrap_err();
        assert!(matches!(err, SwapError::VersionConflict { expected: 1, actual: 2 }));
    }

    #[tokio::test]
    async fn test_save_unknown_exchange() {
        let store = MemoryExchangeStore::new();
        let err = store.save_exchange(exchange("ghost")).await.unwrap_err();
        assert!(matches!(err, SwapError::ExchangeNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = MemoryExchangeStore::new();
        store.insert_exchange(exchange("ex-b")).await.unwrap();
        store.insert_exchange(exchange("ex-a")).await.unwrap();

        let ids = store.list_exchanges().await.unwrap();
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, vec!["ex-a", "ex-b"]);
        assert!(store.load_exchange(&ExchangeId::new("ex-c").unwrap()).await.unwrap().is_none());
    }
}
