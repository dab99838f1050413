//! Notification channels.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::Notifier;
use swapdrop_core::types::{DeliveryEvent, PartyId};

/// Writes every event to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, party: &PartyId, event: &DeliveryEvent) -> Result<()> {
        info!(party_id = %party, exchange_id = %event.exchange_id(), event = event.kind(), "notify");
        Ok(())
    }
}

/// Keeps every event in memory, for tests and the CLI simulation.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(PartyId, DeliveryEvent)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery fail (after recording) until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<(PartyId, DeliveryEvent)> {
        self.events.lock().clone()
    }

    /// Event kinds sent to `party`, in order.
    pub fn kinds_for(&self, party: &PartyId) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|(p, _)| p == party)
            .map(|(_, e)| e.kind())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, party: &PartyId, event: &DeliveryEvent) -> Result<()> {
        self.events.lock().push((party.clone(), event.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(SwapError::NotificationError("recording notifier set to fail".into()));
        }
        Ok(())
    }
}
