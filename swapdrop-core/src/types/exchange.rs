//! The exchange record: two parties, two items, two legs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};
use crate::types::{
    aggregate_status, AnonymizedIdentity, DeliveryLeg, Direction, Dispute, ExchangeId,
    ExchangeStatus, ItemId, LegId, LegStatus, PartyId,
};

/// Which side of the exchange a party is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Party A (ships leg A→B, receives leg B→A)
    A,
    /// Party B (ships leg B→A, receives leg A→B)
    B,
}

/// A two-item swap and its two delivery legs.
///
/// The aggregate status is not a field: [`Exchange::status`] derives it from
/// the legs every time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Marketplace exchange ID
    pub id: ExchangeId,
    /// First party
    pub party_a: PartyId,
    /// Second party
    pub party_b: PartyId,
    /// Item shipped by party A
    pub item_a: ItemId,
    /// Item shipped by party B
    pub item_b: ItemId,
    /// Leg A→B
    pub leg_a: DeliveryLeg,
    /// Leg B→A
    pub leg_b: DeliveryLeg,
    /// Party A's pseudonymous identity
    pub identity_a: AnonymizedIdentity,
    /// Party B's pseudonymous identity
    pub identity_b: AnonymizedIdentity,
    /// Dispute history, newest last
    pub disputes: Vec<Dispute>,
    /// Set when a dispute was resolved with compensation
    pub compensated: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Set in the commit that delivers the second leg
    pub completed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by the store on every save
    pub version: u64,
}

impl Exchange {
    /// Assembles a new exchange at version 0.
    ///
    /// # Errors
    /// Fails if both parties are the same or the legs do not match the parties.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ExchangeId,
        party_a: PartyId,
        party_b: PartyId,
        item_a: ItemId,
        item_b: ItemId,
        leg_a: DeliveryLeg,
        leg_b: DeliveryLeg,
        identity_a: AnonymizedIdentity,
        identity_b: AnonymizedIdentity,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if party_a == party_b {
            return Err(SwapError::ValidationError(
                "an exchange needs two distinct parties".into(),
            ));
        }
        let legs_match = leg_a.direction == Direction::AToB
            && leg_a.sender == party_a
            && leg_a.recipient == party_b
            && leg_b.direction == Direction::BToA
            && leg_b.sender == party_b
            && leg_b.recipient == party_a;
        if !legs_match {
            return Err(SwapError::InternalError("legs do not match exchange parties".into()));
        }

        Ok(Self {
            id,
            party_a,
            party_b,
            item_a,
            item_b,
            leg_a,
            leg_b,
            identity_a,
            identity_b,
            disputes: Vec::new(),
            compensated: false,
            created_at,
            completed_at: None,
            version: 0,
        })
    }

    /// Aggregate status, derived from both legs.
    pub fn status(&self) -> ExchangeStatus {
        aggregate_status(self.leg_a.status(), self.leg_b.status())
    }

    /// Side of `party`, if it belongs to this exchange.
    pub fn side_of(&self, party: &PartyId) -> Option<Side> {
        if party == &self.party_a {
            Some(Side::A)
        } else if party == &self.party_b {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Looks up a leg by ID.
    pub fn leg(&self, leg_id: LegId) -> Result<&DeliveryLeg> {
        [&self.leg_a, &self.leg_b]
            .into_iter()
            .find(|leg| leg.id == leg_id)
            .ok_or_else(|| SwapError::LegNotFound(leg_id.to_string()))
    }

    /// Looks up a leg by ID for mutation.
    pub fn leg_mut(&mut self, leg_id: LegId) -> Result<&mut DeliveryLeg> {
        if self.leg_a.id == leg_id {
            Ok(&mut self.leg_a)
        } else if self.leg_b.id == leg_id {
            Ok(&mut self.leg_b)
        } else {
            Err(SwapError::LegNotFound(leg_id.to_string()))
        }
    }

    /// The leg a side ships.
    pub fn outbound(&self, side: Side) -> &DeliveryLeg {
        match side {
            Side::A => &self.leg_a,
            Side::B => &self.leg_b,
        }
    }

    /// The leg a side collects.
    pub fn inbound(&self, side: Side) -> &DeliveryLeg {
        match side {
            Side::A => &self.leg_b,
            Side::B => &self.leg_a,
        }
    }

    /// The currently open dispute, if any.
    pub fn open_dispute(&self) -> Option<&Dispute> {
        self.disputes.iter().rev().find(|d| d.is_open())
    }

    /// Returns true while a dispute is open.
    pub fn is_frozen(&self) -> bool {
        self.open_dispute().is_some()
    }

    /// Fails with [`SwapError::ExchangeFrozen`] while a dispute is open.
    pub fn ensure_not_frozen(&self) -> Result<()> {
        match self.open_dispute() {
            Some(dispute) => Err(SwapError::ExchangeFrozen {
                dispute_id: dispute.id.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Returns true once both legs are terminal.
    pub fn is_closed(&self) -> bool {
        self.leg_a.status().is_terminal() && self.leg_b.status().is_terminal()
    }

    /// When the later of the two legs became terminal.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_closed() {
            return None;
        }
        self.leg_a.terminal_at().max(self.leg_b.terminal_at())
    }

    /// Post-transition bookkeeping: completion time and mapping retention.
    ///
    /// Called in the same commit as every leg transition.
    pub fn settle(&mut self, now: DateTime<Utc>, retention: Duration) {
        if self.completed_at.is_none()
            && self.leg_a.status() == LegStatus::Delivered
            && self.leg_b.status() == LegStatus::Delivered
        {
            self.completed_at = Some(now);
        }

        if let Some(closed_at) = self.closed_at() {
            for identity in [&mut self.identity_a, &mut self.identity_b] {
                if let Some(mapping) = identity.mapping.as_mut() {
                    if mapping.expires_at.is_none() {
                        mapping.expires_at = Some(closed_at + retention);
                    }
                }
            }
        }
    }

    /// Drops sealed mappings whose retention has expired. Returns how many were removed.
    pub fn purge_expired_mappings(&mut self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for identity in [&mut self.identity_a, &mut self.identity_b] {
            if identity.mapping.as_ref().map(|m| m.is_expired(now)).unwrap_or(false) {
                identity.mapping = None;
                purged += 1;
            }
        }
        purged
    }
}
