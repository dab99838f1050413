//! Leg states, exchange-wide aggregate status, and next actions.
//!
//! The aggregate status is never stored. [`aggregate_status`] is the only place
//! it is computed, from the two leg states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of one delivery leg.
///
/// Progress order: `LabelGenerated → Shipped → Arrived → Delivered`.
/// `Lost` and `Cancelled` are terminal failures reachable from any non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegStatus {
    /// Label printed, waiting for the sender to drop the parcel off
    LabelGenerated,
    /// Handed to the carrier
    Shipped,
    /// Waiting at the destination pickup point
    Arrived,
    /// Collected by the recipient (terminal success)
    Delivered,
    /// Lost in transit (terminal failure)
    Lost,
    /// Cancelled by dispute resolution (terminal failure)
    Cancelled,
}

impl LegStatus {
    /// Returns true for `Delivered`, `Lost` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, LegStatus::Delivered | LegStatus::Lost | LegStatus::Cancelled)
    }

    /// Position along the success track, `None` for failure states.
    pub fn progress(self) -> Option<u8> {
        match self {
            LegStatus::LabelGenerated => Some(0),
            LegStatus::Shipped => Some(1),
            LegStatus::Arrived => Some(2),
            LegStatus::Delivered => Some(3),
            LegStatus::Lost | LegStatus::Cancelled => None,
        }
    }

    /// Returns true if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: LegStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            LegStatus::Lost | LegStatus::Cancelled => true,
            _ => match (self.progress(), next.progress()) {
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }

    /// Snake-case name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            LegStatus::LabelGenerated => "label_generated",
            LegStatus::Shipped => "shipped",
            LegStatus::Arrived => "arrived",
            LegStatus::Delivered => "delivered",
            LegStatus::Lost => "lost",
            LegStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a leg inside an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Party A ships item A to party B
    AToB,
    /// Party B ships item B to party A
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => f.write_str("A→B"),
            Direction::BToA => f.write_str("B→A"),
        }
    }
}

/// Exchange-wide status derived from both legs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    /// Neither leg has shipped
    LabelsGenerated,
    /// Exactly one leg shipped, neither arrived
    PartialShipped,
    /// Both legs shipped, neither arrived
    BothShipped,
    /// Exactly one leg arrived, neither delivered
    PartialArrived,
    /// Both legs arrived, neither delivered
    BothArrived,
    /// Exactly one leg delivered
    PartialDelivered,
    /// Both legs delivered
    Completed,
    /// One leg lost
    PartialLost,
    /// Both legs lost
    BothLost,
    /// At least one leg cancelled, none lost
    Cancelled,
}

impl ExchangeStatus {
    /// Returns true once no further leg transition can change the status.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            ExchangeStatus::Completed | ExchangeStatus::BothLost | ExchangeStatus::Cancelled
        )
    }

    /// Snake-case name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            ExchangeStatus::LabelsGenerated => "labels_generated",
            ExchangeStatus::PartialShipped => "partial_shipped",
            ExchangeStatus::BothShipped => "both_shipped",
            ExchangeStatus::PartialArrived => "partial_arrived",
            ExchangeStatus::BothArrived => "both_arrived",
            ExchangeStatus::PartialDelivered => "partial_delivered",
            ExchangeStatus::Completed => "completed",
            ExchangeStatus::PartialLost => "partial_lost",
            ExchangeStatus::BothLost => "both_lost",
            ExchangeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the aggregate exchange status from the two leg states.
///
/// Precedence, highest first:
///
/// | condition                       | status              |
/// |---------------------------------|---------------------|
/// | both legs `lost`                | `both_lost`         |
/// | one leg `lost`                  | `partial_lost`      |
/// | any leg `cancelled`             | `cancelled`         |
/// | both `delivered`                | `completed`         |
/// | exactly one `delivered`         | `partial_delivered` |
/// | both `arrived`                  | `both_arrived`      |
/// | exactly one `arrived`           | `partial_arrived`   |
/// | both `shipped`                  | `both_shipped`      |
/// | exactly one `shipped`           | `partial_shipped`   |
/// | otherwise                       | `labels_generated`  |
///
/// The function is symmetric in its arguments.
pub fn aggregate_status(a: LegStatus, b: LegStatus) -> ExchangeStatus {
    let count = |status: LegStatus| [a, b].iter().filter(|&&s| s == status).count();

    match count(LegStatus::Lost) {
        2 => return ExchangeStatus::BothLost,
        1 => return ExchangeStatus::PartialLost,
        _ => {}
    }
    if count(LegStatus::Cancelled) > 0 {
        return ExchangeStatus::Cancelled;
    }

    let ladder = [
        (LegStatus::Delivered, ExchangeStatus::Completed, ExchangeStatus::PartialDelivered),
        (LegStatus::Arrived, ExchangeStatus::BothArrived, ExchangeStatus::PartialArrived),
        (LegStatus::Shipped, ExchangeStatus::BothShipped, ExchangeStatus::PartialShipped),
    ];
    for (state, both, one) in ladder {
        match count(state) {
            2 => return both,
            1 => return one,
            _ => {}
        }
    }

    ExchangeStatus::LabelsGenerated
}

/// What a party must do next. Derived on read, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NextAction {
    /// Drop the outbound parcel off with the carrier
    Ship,
    /// Wait for the counterpart to ship
    AwaitCounterpartShip,
    /// Collect the inbound parcel at the pickup point
    Pickup,
    /// Wait for the counterpart to collect their parcel
    AwaitCounterpartPickup,
    /// Rate the completed exchange
    Rate,
    /// Nothing to do right now
    None,
}
