//! Delivery legs and their state machine.
//!
//! A leg only changes through the transition methods below. Each method checks
//! the current state and the acting party first and leaves the leg untouched on
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::types::{
    Direction, ExchangeId, LegId, LegStatus, PartyId, PickupPoint, ShippingLabel,
    WithdrawalCredential,
};

/// One one-way shipment inside an exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLeg {
    /// Leg identifier
    pub id: LegId,
    /// Owning exchange
    pub exchange_id: ExchangeId,
    /// A→B or B→A
    pub direction: Direction,
    /// Party who ships
    pub sender: PartyId,
    /// Party who collects
    pub recipient: PartyId,
    /// Destination pickup point
    pub pickup_point: PickupPoint,
    /// Anonymized carrier label
    pub label: ShippingLabel,
    /// Carrier tracking reference, set on shipment
    pub tracking_ref: Option<String>,
    /// Proof recorded on arrival (scan id, pickup-point receipt)
    pub arrival_proof: Option<String>,
    /// Evidence recorded on loss
    pub loss_evidence: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Shipment time
    pub shipped_at: Option<DateTime<Utc>>,
    /// Arrival time
    pub arrived_at: Option<DateTime<Utc>>,
    /// Collection time
    pub delivered_at: Option<DateTime<Utc>>,
    /// Failure time (lost or cancelled)
    pub closed_at: Option<DateTime<Utc>>,
    status: LegStatus,
    credential: WithdrawalCredential,
}

impl DeliveryLeg {
    /// Creates a leg in `label_generated`.
    ///
    /// # Errors
    /// Fails if the credential is bound to a different leg or holder.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LegId,
        exchange_id: ExchangeId,
        direction: Direction,
        sender: PartyId,
        recipient: PartyId,
        pickup_point: PickupPoint,
        label: ShippingLabel,
        credential: WithdrawalCredential,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if credential.leg_id() != id || credential.holder() != &recipient {
            return Err(SwapError::InternalError(
                "withdrawal credential is not bound to this leg's recipient".into(),
            ));
        }
        Ok(Self {
            id,
            exchange_id,
            direction,
            sender,
            recipient,
            pickup_point,
            label,
            tracking_ref: None,
            arrival_proof: None,
            loss_evidence: None,
            created_at,
            shipped_at: None,
            arrived_at: None,
            delivered_at: None,
            closed_at: None,
            status: LegStatus::LabelGenerated,
            credential,
        })
    }

    /// Current state.
    pub fn status(&self) -> LegStatus {
        self.status
    }

    /// The leg's withdrawal credential.
    pub fn credential(&self) -> &WithdrawalCredential {
        &self.credential
    }

    /// Party expected to perform the next action, if any.
    ///
    /// The sender ships; the recipient collects. While the parcel is with the
    /// carrier nobody on the exchange acts.
    pub fn next_actor(&self) -> Option<&PartyId> {
        match self.status {
            LegStatus::LabelGenerated => Some(&self.sender),
            LegStatus::Arrived => Some(&self.recipient),
            _ => None,
        }
    }

    /// `label_generated → shipped`.
    ///
    /// Returns `Ok(false)` without changes when the leg is already shipped
    /// under the same tracking reference.
    pub fn ship(&mut self, actor: &PartyId, tracking_ref: &str, at: DateTime<Utc>) -> Result<bool> {
        const OP: &str = "confirm shipment of";

        if self.status == LegStatus::Shipped {
            return match self.tracking_ref.as_deref() {
                Some(existing) if existing == tracking_ref && actor == &self.sender => Ok(false),
                Some(existing) if actor == &self.sender => Err(SwapError::TrackingConflict {
                    existing: existing.to_string(),
                    presented: tracking_ref.to_string(),
                }),
                _ => Err(self.refuse(OP, "only the sender confirms shipment")),
            };
        }
        if self.status != LegStatus::LabelGenerated {
            return Err(self.refuse(OP, "leg is past shipment"));
        }
        if actor != &self.sender {
            return Err(self.refuse(OP, "only the sender confirms shipment"));
        }

        self.status = LegStatus::Shipped;
        self.tracking_ref = Some(tracking_ref.to_string());
        self.shipped_at = Some(at);
        Ok(true)
    }

    /// `shipped → arrived`.
    pub fn arrive(&mut self, proof: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status != LegStatus::Shipped {
            return Err(self.refuse("confirm arrival of", "leg is not in transit"));
        }
        self.status = LegStatus::Arrived;
        self.arrival_proof = Some(proof.to_string());
        self.arrived_at = Some(at);
        Ok(())
    }

    /// Checks state and actor for a pickup, without touching the credential.
    pub fn check_pickup(&self, actor: &PartyId) -> Result<()> {
        const OP: &str = "confirm pickup of";

        if self.status != LegStatus::Arrived {
            return Err(self.refuse(OP, "parcel is not waiting at the pickup point"));
        }
        if actor != &self.recipient {
            return Err(self.refuse(OP, "only the recipient collects the parcel"));
        }
        if self.credential.is_consumed() {
            return Err(SwapError::CredentialMismatch);
        }
        Ok(())
    }

    /// `arrived → delivered`, consuming the credential.
    ///
    /// The caller has already verified the presented code and the holder's identity.
    pub fn deliver(&mut self, actor: &PartyId, at: DateTime<Utc>) -> Result<()> {
        self.check_pickup(actor)?;
        self.credential.consume(actor.clone(), at)?;
        self.status = LegStatus::Delivered;
        self.delivered_at = Some(at);
        Ok(())
    }

    /// Any non-terminal state `→ lost`.
    pub fn mark_lost(&mut self, evidence: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.refuse("report loss of", "leg is already closed"));
        }
        self.status = LegStatus::Lost;
        self.loss_evidence = Some(evidence.to_string());
        self.closed_at = Some(at);
        Ok(())
    }

    /// Any non-terminal state `→ cancelled`.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.refuse("cancel", "leg is already closed"));
        }
        self.status = LegStatus::Cancelled;
        self.closed_at = Some(at);
        Ok(())
    }

    /// When the leg reached a terminal state.
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            LegStatus::Delivered => self.delivered_at,
            LegStatus::Lost | LegStatus::Cancelled => self.closed_at,
            _ => None,
        }
    }

    fn refuse(&self, operation: &'static str, reason: &str) -> SwapError {
        SwapError::InvalidTransition {
            operation,
            status: self.status,
            reason: reason.to_string(),
        }
    }
}
