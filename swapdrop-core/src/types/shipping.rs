//! Carrier-facing documents, tracking updates and party notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ContactCard, Direction, DisputeId, DisputeOutcome, ExchangeId, LegId, PickupPoint,
};

// ═══════════════════════════════════════════════════════════════════════════════
// LABELS
// ═══════════════════════════════════════════════════════════════════════════════

/// What the engine asks the carrier to print. Contains no real sender data
/// and no real recipient address: `to` is held at the pickup point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRequest {
    /// Exchange reference
    pub exchange_id: ExchangeId,
    /// Leg reference
    pub leg_id: LegId,
    /// Leg direction
    pub direction: Direction,
    /// Anonymized sender card (operator relay address)
    pub from: ContactCard,
    /// Recipient pseudonym, addressed to the pickup point
    pub to: ContactCard,
    /// Destination pickup point
    pub pickup_point: PickupPoint,
}

/// A label issued by the carrier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLabel {
    /// Carrier's label identifier
    pub label_id: String,
    /// Carrier name
    pub carrier: String,
    /// Printed sender card
    pub from: ContactCard,
    /// Printed recipient card
    pub to: ContactCard,
    /// Pickup point the parcel is routed to
    pub pickup_point_id: String,
    /// Issue time
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACKING
// ═══════════════════════════════════════════════════════════════════════════════

/// Carrier-side parcel state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    /// Label exists but no scan yet
    Pending,
    /// Moving through the network
    InTransit,
    /// Delivered to the pickup point
    ReadyForPickup,
    /// Declared lost by the carrier
    Lost,
}

/// Latest tracking information for a parcel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingUpdate {
    /// Tracking reference queried
    pub tracking_ref: String,
    /// Current state
    pub state: TrackingState,
    /// Free-text carrier event
    pub detail: String,
    /// When the carrier observed the state
    pub observed_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTIFICATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event pushed to a party after a committed change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// Labels and pickup instructions are ready
    DeliveryCreated {
        /// Exchange reference
        exchange_id: ExchangeId,
    },
    /// A leg was handed to the carrier
    LegShipped {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Leg reference
        leg_id: LegId,
    },
    /// A parcel is waiting at its pickup point
    LegArrived {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Leg reference
        leg_id: LegId,
        /// Pickup point name
        pickup_point: String,
    },
    /// A parcel was collected
    LegDelivered {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Leg reference
        leg_id: LegId,
    },
    /// A parcel was reported lost
    LegLost {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Leg reference
        leg_id: LegId,
    },
    /// Both parcels were collected
    ExchangeCompleted {
        /// Exchange reference
        exchange_id: ExchangeId,
    },
    /// The exchange is frozen pending support review
    DisputeOpened {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Dispute reference
        dispute_id: DisputeId,
    },
    /// Support closed the dispute
    DisputeResolved {
        /// Exchange reference
        exchange_id: ExchangeId,
        /// Dispute reference
        dispute_id: DisputeId,
        /// Decision taken
        outcome: DisputeOutcome,
    },
}

impl DeliveryEvent {
    /// Exchange the event belongs to.
    pub fn exchange_id(&self) -> &ExchangeId {
        match self {
            DeliveryEvent::DeliveryCreated { exchange_id }
            | DeliveryEvent::LegShipped { exchange_id, .. }
            | DeliveryEvent::LegArrived { exchange_id, .. }
            | DeliveryEvent::LegDelivered { exchange_id, .. }
            | DeliveryEvent::LegLost { exchange_id, .. }
            | DeliveryEvent::ExchangeCompleted { exchange_id }
            | DeliveryEvent::DisputeOpened { exchange_id, .. }
            | DeliveryEvent::DisputeResolved { exchange_id, .. } => exchange_id,
        }
    }

    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryEvent::DeliveryCreated { .. } => "delivery_created",
            DeliveryEvent::LegShipped { .. } => "leg_shipped",
            DeliveryEvent::LegArrived { .. } => "leg_arrived",
            DeliveryEvent::LegDelivered { .. } => "leg_delivered",
            DeliveryEvent::LegLost { .. } => "leg_lost",
            DeliveryEvent::ExchangeCompleted { .. } => "exchange_completed",
            DeliveryEvent::DisputeOpened { .. } => "dispute_opened",
            DeliveryEvent::DisputeResolved { .. } => "dispute_resolved",
        }
    }
}
