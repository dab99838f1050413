//! Locked read-modify-write of one exchange.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::{ExchangeStore, Notifier};
use swapdrop_core::types::{DeliveryEvent, Exchange, ExchangeId};

use crate::error::{OpResult, WithStatus};
use crate::locks::ExchangeLocks;

/// What a transition produced.
pub(crate) struct Applied<T> {
    pub value: T,
    pub events: Vec<DeliveryEvent>,
    pub changed: bool,
}

impl<T> Applied<T> {
    /// A mutation to save, with the events to send once it is committed.
    pub fn changed(value: T, events: Vec<DeliveryEvent>) -> Self {
        Self { value, events, changed: true }
    }

    /// Nothing to save.
    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
            changed: false,
        }
    }
}

/// Runs transitions on one exchange at a time.
///
/// The transition works on a copy of the stored record; the store save is
/// the only commit point. An error from the transition, a failed save, or a
/// dropped future all leave the stored exchange as it was.
#[derive(Clone)]
pub(crate) struct Committer {
    pub store: Arc<dyn ExchangeStore>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: ExchangeLocks,
    pub retention: Duration,
}

impl Committer {
    pub async fn load(&self, exchange_id: &ExchangeId) -> Result<Exchange> {
        self.store
            .load_exchange(exchange_id)
            .await?
            .ok_or_else(|| SwapError::ExchangeNotFound(exchange_id.to_string()))
    }

    /// Applies `transition` under the exchange lock and notifies both parties
    /// after the lock is released.
    pub async fn run<T, F>(&self, exchange_id: &ExchangeId, transition: F) -> OpResult<(T, Exchange)>
    where
        T: Send,
        F: FnOnce(&mut Exchange, DateTime<Utc>) -> Result<Applied<T>> + Send,
    {
        let guard = self.locks.acquire(exchange_id).await;

        let current = self.load(exchange_id).await?;
        let status = current.status();
        let now = Utc::now();

        let mut next = current.clone();
        let applied = transition(&mut next, now).with_status(status)?;

        let stored = if applied.changed {
            next.settle(now, self.retention);
            self.store.save_exchange(next).await.with_status(status)?
        } else {
            debug!(exchange_id = %exchange_id, "no change to commit");
            current
        };
        drop(guard);

        self.broadcast(&stored, &applied.events).await;
        Ok((applied.value, stored))
    }

    /// Sends every event to both parties. Failures are logged and dropped.
    pub async fn broadcast(&self, exchange: &Exchange, events: &[DeliveryEvent]) {
        for event in events {
            for party in [&exchange.party_a, &exchange.party_b] {
                if let Err(e) = self.notifier.notify(party, event).await {
                    warn!(
                        exchange_id = %exchange.id,
                        party_id = %party,
                        event = event.kind(),
                        error = %e,
                        "notification failed"
                    );
                }
            }
        }
    }
}
