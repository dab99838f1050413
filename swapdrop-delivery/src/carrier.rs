//! Simulated carrier gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::CarrierGateway;
use swapdrop_core::types::{LabelRequest, ShippingLabel, TrackingState, TrackingUpdate};

/// In-process carrier for development, demos and tests.
///
/// Labels are derived from the leg ID, so the same request always yields the
/// same label. Tracking states are scripted with [`set_tracking`](Self::set_tracking);
/// unknown references report `Pending`.
#[derive(Debug)]
pub struct SimulatedCarrier {
    name: String,
    labels: RwLock<Vec<ShippingLabel>>,
    tracking: RwLock<HashMap<String, TrackingUpdate>>,
    unavailable: AtomicBool,
}

impl SimulatedCarrier {
    /// Creates a carrier reporting under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: RwLock::new(Vec::new()),
            tracking: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Scripts the state the next `track_package` call reports.
    pub fn set_tracking(&self, tracking_ref: &str, state: TrackingState, detail: impl Into<String>) {
        let update = TrackingUpdate {
            tracking_ref: tracking_ref.to_string(),
            state,
            detail: detail.into(),
            observed_at: Utc::now(),
        };
        self.tracking.write().insert(tracking_ref.to_string(), update);
    }

    /// Makes every call fail with `CarrierError` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Labels issued so far.
    pub fn labels(&self) -> Vec<ShippingLabel> {
        self.labels.read().clone()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SwapError::CarrierError(format!("{} is unavailable", self.name)));
        }
        Ok(())
    }
}

impl Default for SimulatedCarrier {
    fn default() -> Self {
        Self::new("simulated")
    }
}

#[async_trait]
impl CarrierGateway for SimulatedCarrier {
    async fn create_shipping_label(&self, request: &LabelRequest) -> Result<ShippingLabel> {
        self.ensure_available()?;

        let label = ShippingLabel {
            label_id: format!("SIM-{}", request.leg_id.as_uuid().simple()).to_uppercase(),
            carrier: self.name.clone(),
            from: request.from.clone(),
            to: request.to.clone(),
            pickup_point_id: request.pickup_point.id.clone(),
            created_at: Utc::now(),
        };
        debug!(label_id = %label.label_id, leg_id = %request.leg_id, "label issued");
        self.labels.write().push(label.clone());
        Ok(label)
    }

    async fn track_package(&self, tracking_ref: &str) -> Result<TrackingUpdate> {
        self.ensure_available()?;

        Ok(self
            .tracking
            .read()
            .get(tracking_ref)
            .cloned()
            .unwrap_or_else(|| TrackingUpdate {
                tracking_ref: tracking_ref.to_string(),
                state: TrackingState::Pending,
                detail: "no scan yet".into(),
                observed_at: Utc::now(),
            }))
    }
}
