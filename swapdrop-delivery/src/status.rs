//! Read-only status views.
//!
//! The aggregate status comes from [`aggregate_status`] over the two leg
//! states; next actions are derived here from the same inputs. Neither is
//! ever stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use swapdrop_core::types::aggregate_status;
use swapdrop_core::types::{
    DeliveryLeg, Direction, DisputeId, Exchange, ExchangeId, ExchangeStatus, LegId, LegStatus,
    NextAction, Side,
};

/// Public view of one leg. Never contains the withdrawal code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegView {
    /// Leg reference
    pub leg_id: LegId,
    /// A→B or B→A
    pub direction: Direction,
    /// Current state
    pub status: LegStatus,
    /// Destination pickup point
    pub pickup_point_id: String,
    /// Carrier label
    pub label_id: String,
    /// Tracking reference, once shipped
    pub tracking_ref: Option<String>,
    /// Shipment time
    pub shipped_at: Option<DateTime<Utc>>,
    /// Arrival time
    pub arrived_at: Option<DateTime<Utc>>,
    /// Collection time
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<&DeliveryLeg> for LegView {
    fn from(leg: &DeliveryLeg) -> Self {
        Self {
            leg_id: leg.id,
            direction: leg.direction,
            status: leg.status(),
            pickup_point_id: leg.pickup_point.id.clone(),
            label_id: leg.label.label_id.clone(),
            tracking_ref: leg.tracking_ref.clone(),
            shipped_at: leg.shipped_at,
            arrived_at: leg.arrived_at,
            delivered_at: leg.delivered_at,
        }
    }
}

/// Result of `get_status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    /// Exchange reference
    pub exchange_id: ExchangeId,
    /// Derived from both legs
    pub aggregate_status: ExchangeStatus,
    /// Leg A→B
    pub leg_a: LegView,
    /// Leg B→A
    pub leg_b: LegView,
    /// What party A should do
    pub next_action_a: NextAction,
    /// What party B should do
    pub next_action_b: NextAction,
    /// Open dispute freezing the exchange, if any
    pub open_dispute: Option<DisputeId>,
    /// Set after a compensation outcome
    pub compensated: bool,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
    /// Stored version
    pub version: u64,
}

impl From<&Exchange> for StatusView {
    fn from(exchange: &Exchange) -> Self {
        Self {
            exchange_id: exchange.id.clone(),
            aggregate_status: exchange.status(),
            leg_a: LegView::from(&exchange.leg_a),
            leg_b: LegView::from(&exchange.leg_b),
            next_action_a: next_action(exchange, Side::A),
            next_action_b: next_action(exchange, Side::B),
            open_dispute: exchange.open_dispute().map(|d| d.id),
            compensated: exchange.compensated,
            completed_at: exchange.completed_at,
            version: exchange.version,
        }
    }
}

/// Next action for the party on `side`.
///
/// Rules, first match wins:
/// 1. frozen by an open dispute: `None`
/// 2. exchange completed: `Rate`
/// 3. own parcel not shipped yet: `Ship`
/// 4. inbound parcel at the pickup point: `Pickup`
/// 5. own parcel collected, counterpart's still collectable: `AwaitCounterpartPickup`
/// 6. counterpart has not shipped: `AwaitCounterpartShip`
/// 7. otherwise (parcels in transit, or nothing left to do): `None`
///
/// A lost or cancelled leg only suppresses the actions that wait on it; once
/// a dispute is resolved the surviving leg still drives its own party.
pub fn next_action(exchange: &Exchange, side: Side) -> NextAction {
    if exchange.is_frozen() {
        return NextAction::None;
    }
    if exchange.status() == ExchangeStatus::Completed {
        return NextAction::Rate;
    }

    let outbound = exchange.outbound(side).status();
    let inbound = exchange.inbound(side).status();
    match (outbound, inbound) {
        (LegStatus::LabelGenerated, _) => NextAction::Ship,
        (_, LegStatus::Arrived) => NextAction::Pickup,
        (LegStatus::Shipped | LegStatus::Arrived, LegStatus::Delivered) => NextAction::AwaitCounterpartPickup,
        (_, LegStatus::LabelGenerated) => NextAction::AwaitCounterpartShip,
        _ => NextAction::None,
    }
}
