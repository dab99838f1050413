//! Bidirectional delivery orchestration.
//!
//! The orchestrator is the only writer of exchanges and legs. Every transition
//! runs under the exchange's lock as a single read-modify-write; carrier calls
//! happen before the lock is taken and notifications after it is released.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::{CarrierGateway, ExchangeStore, Notifier};
use swapdrop_core::types::{
    AnonymizedIdentity, DeliveryEvent, DeliveryLeg, Direction, DisputeReason, Exchange,
    ExchangeId, ExchangeStatus, ItemId, LabelRequest, LegId, LegStatus, PartyId, PickupPoint,
    Pseudonym, RealParty, Reporter, ShippingLabel, TrackingState,
};
use swapdrop_pickup::PickupPointDirectory;
use swapdrop_privacy::{CredentialIssuer, IdentityAnonymizer};

use crate::commit::{Applied, Committer};
use crate::config::OrchestratorConfig;
use crate::dispute::raise_dispute;
use crate::error::{OpResult, Rejection, WithStatus};
use crate::limiter::PickupAttemptLimiter;
use crate::locks::ExchangeLocks;
use crate::status::{LegView, StatusView};

// ═══════════════════════════════════════════════════════════════════════════════
// REQUESTS AND PLANS
// ═══════════════════════════════════════════════════════════════════════════════

/// A matched swap, as handed over by the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExchange {
    /// Marketplace exchange ID
    pub exchange_id: ExchangeId,
    /// Party A, shipping `item_a`
    pub party_a: RealParty,
    /// Party B, shipping `item_b`
    pub party_b: RealParty,
    /// Item shipped by A
    pub item_a: ItemId,
    /// Item shipped by B
    pub item_b: ItemId,
}

/// How a party sends its parcel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipInstructions {
    /// Leg the parcel travels on
    pub leg_id: LegId,
    /// Label to print and stick on the parcel
    pub label: ShippingLabel,
}

/// How a party collects the counterpart's parcel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectInstructions {
    /// Leg to collect
    pub leg_id: LegId,
    /// Where the parcel will wait
    pub pickup_point: PickupPoint,
    /// Code to present at the counter
    pub withdrawal_code: String,
}

/// Everything one party needs for the swap. Sent to that party only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInstructions {
    /// Recipient of these instructions
    pub party_id: PartyId,
    /// Name the party appears under on documents
    pub pseudonym: Pseudonym,
    /// Outbound parcel
    pub ship: ShipInstructions,
    /// Inbound parcel
    pub collect: CollectInstructions,
}

/// Result of `create_delivery`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPlan {
    /// Exchange reference
    pub exchange_id: ExchangeId,
    /// Always `labels_generated` for a new plan
    pub aggregate_status: ExchangeStatus,
    /// Leg A→B
    pub leg_a: LegView,
    /// Leg B→A
    pub leg_b: LegView,
    /// For party A
    pub instructions_a: DeliveryInstructions,
    /// For party B
    pub instructions_b: DeliveryInstructions,
}

impl DeliveryPlan {
    fn from_exchange(exchange: &Exchange) -> Self {
        let instructions = |outbound: &DeliveryLeg, inbound: &DeliveryLeg, identity: &AnonymizedIdentity| {
            DeliveryInstructions {
                party_id: identity.party_id.clone(),
                pseudonym: identity.pseudonym.clone(),
                ship: ShipInstructions {
                    leg_id: outbound.id,
                    label: outbound.label.clone(),
                },
                collect: CollectInstructions {
                    leg_id: inbound.id,
                    pickup_point: inbound.pickup_point.clone(),
                    withdrawal_code: inbound.credential().code().as_str().to_string(),
                },
            }
        };

        Self {
            exchange_id: exchange.id.clone(),
            aggregate_status: exchange.status(),
            leg_a: LegView::from(&exchange.leg_a),
            leg_b: LegView::from(&exchange.leg_b),
            instructions_a: instructions(&exchange.leg_a, &exchange.leg_b, &exchange.identity_a),
            instructions_b: instructions(&exchange.leg_b, &exchange.leg_a, &exchange.identity_b),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Owns the two legs of every exchange and the transitions between their states.
pub struct DeliveryOrchestrator {
    committer: Committer,
    carrier: Arc<dyn CarrierGateway>,
    directory: Arc<PickupPointDirectory>,
    anonymizer: IdentityAnonymizer,
    issuer: CredentialIssuer,
    limiter: PickupAttemptLimiter,
}

impl DeliveryOrchestrator {
    /// Creates an orchestrator.
    ///
    /// `locks` must be shared with any [`DisputeHandler`](crate::DisputeHandler)
    /// working on the same store.
    ///
    /// # Errors
    /// `ConfigError` if the pickup attempt budget is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ExchangeStore>,
        carrier: Arc<dyn CarrierGateway>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<PickupPointDirectory>,
        anonymizer: IdentityAnonymizer,
        issuer: CredentialIssuer,
        locks: ExchangeLocks,
        config: &OrchestratorConfig,
    ) -> Result<Self> {
        Ok(Self {
            committer: Committer {
                store,
                notifier,
                locks,
                retention: config.retention(),
            },
            carrier,
            directory,
            anonymizer,
            issuer,
            limiter: PickupAttemptLimiter::new(&config.limiter)?,
        })
    }

    /// The exchange store.
    pub fn store(&self) -> &Arc<dyn ExchangeStore> {
        &self.committer.store
    }

    /// The lock table.
    pub fn locks(&self) -> &ExchangeLocks {
        &self.committer.locks
    }

    /// The pickup attempt limiter.
    pub fn limiter(&self) -> &PickupAttemptLimiter {
        &self.limiter
    }

    /// The identity anonymizer.
    pub fn anonymizer(&self) -> &IdentityAnonymizer {
        &self.anonymizer
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Creation
    // ───────────────────────────────────────────────────────────────────────────

    /// Anonymizes both parties, routes each leg to a pickup point near its
    /// recipient, issues the withdrawal credentials and the carrier labels,
    /// then stores the exchange with both legs in `label_generated`.
    ///
    /// All lookups and carrier calls happen before anything is stored; a
    /// failure at any step stores nothing.
    #[instrument(skip_all, fields(exchange_id = %request.exchange_id))]
    pub async fn create_delivery(&self, request: NewExchange) -> OpResult<DeliveryPlan> {
        let NewExchange {
            exchange_id,
            party_a,
            party_b,
            item_a,
            item_b,
        } = request;

        party_a.validate("party_a")?;
        party_b.validate("party_b")?;
        if party_a.id == party_b.id {
            return Err(SwapError::ValidationError("an exchange needs two distinct parties".into()).into());
        }
        if let Some(existing) = self.store().load_exchange(&exchange_id).await? {
            return Err(Rejection::new(
                SwapError::DuplicateExchange(exchange_id.to_string()),
                Some(existing.status()),
            ));
        }

        let now = Utc::now();
        let identity_a = self.anonymizer.anonymize(&exchange_id, &party_a, now)?;
        let identity_b = self.anonymizer.anonymize(&exchange_id, &party_b, now)?;

        let point_to_b = self.directory.resolve_nearest(&party_b.address).await?;
        let point_to_a = self.directory.resolve_nearest(&party_a.address).await?;

        let leg_a = self
            .prepare_leg(&exchange_id, Direction::AToB, &identity_a, &identity_b, point_to_b, now)
            .await?;
        let leg_b = self
            .prepare_leg(&exchange_id, Direction::BToA, &identity_b, &identity_a, point_to_a, now)
            .await?;

        let exchange = Exchange::new(
            exchange_id.clone(),
            party_a.id,
            party_b.id,
            item_a,
            item_b,
            leg_a,
            leg_b,
            identity_a,
            identity_b,
            now,
        )?;

        let stored = {
            let _guard = self.locks().acquire(&exchange_id).await;
            self.store().insert_exchange(exchange).await?
        };
        info!(
            leg_a = %stored.leg_a.id,
            leg_b = %stored.leg_b.id,
            "delivery created"
        );

        self.committer
            .broadcast(&stored, &[DeliveryEvent::DeliveryCreated { exchange_id }])
            .await;
        Ok(DeliveryPlan::from_exchange(&stored))
    }

    async fn prepare_leg(
        &self,
        exchange_id: &ExchangeId,
        direction: Direction,
        sender: &AnonymizedIdentity,
        recipient: &AnonymizedIdentity,
        pickup_point: PickupPoint,
        now: DateTime<Utc>,
    ) -> Result<DeliveryLeg> {
        let leg_id = LegId::generate();
        let credential = self.issuer.issue(exchange_id, leg_id, &recipient.party_id, now);

        let request = LabelRequest {
            exchange_id: exchange_id.clone(),
            leg_id,
            direction,
            from: sender.as_sender.clone(),
            to: recipient.as_recipient.at_pickup_point(&pickup_point),
            pickup_point: pickup_point.clone(),
        };
        let label = self.carrier.create_shipping_label(&request).await?;

        DeliveryLeg::new(
            leg_id,
            exchange_id.clone(),
            direction,
            sender.party_id.clone(),
            recipient.party_id.clone(),
            pickup_point,
            label,
            credential,
            now,
        )
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Leg transitions
    // ───────────────────────────────────────────────────────────────────────────

    /// `label_generated → shipped`, by the leg's sender.
    ///
    /// Repeating the call with the same tracking reference succeeds without
    /// change; a different reference is a `TrackingConflict`.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, leg_id = %leg_id))]
    pub async fn confirm_shipment(
        &self,
        exchange_id: &ExchangeId,
        leg_id: LegId,
        actor: &PartyId,
        tracking_ref: &str,
    ) -> OpResult<LegStatus> {
        let tracking_ref = tracking_ref.trim();

        let (status, _) = self
            .committer
            .run(exchange_id, |exchange, now| {
                exchange.ensure_not_frozen()?;
                if tracking_ref.is_empty() {
                    return Err(SwapError::MissingField("tracking_ref".into()));
                }

                let leg = exchange.leg_mut(leg_id)?;
                if !leg.ship(actor, tracking_ref, now)? {
                    return Ok(Applied::unchanged(leg.status()));
                }

                info!(tracking_ref, "leg shipped");
                let event = DeliveryEvent::LegShipped {
                    exchange_id: exchange.id.clone(),
                    leg_id,
                };
                Ok(Applied::changed(LegStatus::Shipped, vec![event]))
            })
            .await?;
        Ok(status)
    }

    /// `shipped → arrived`, on proof from the carrier or the pickup point.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, leg_id = %leg_id))]
    pub async fn confirm_arrival(
        &self,
        exchange_id: &ExchangeId,
        leg_id: LegId,
        arrival_proof: &str,
    ) -> OpResult<LegStatus> {
        let (status, _) = self
            .committer
            .run(exchange_id, |exchange, now| apply_arrival(exchange, leg_id, arrival_proof, now))
            .await?;
        Ok(status)
    }

    /// `arrived → delivered`, consuming the withdrawal credential.
    ///
    /// Checks run in order: freeze, leg state and actor, attempt budget,
    /// identity verification, code. The first failure rejects the attempt
    /// and leaves the leg and its credential untouched.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, leg_id = %leg_id))]
    pub async fn confirm_pickup(
        &self,
        exchange_id: &ExchangeId,
        leg_id: LegId,
        actor: &PartyId,
        presented_code: &str,
        identity_verified: bool,
    ) -> OpResult<LegStatus> {
        let (status, _) = self
            .committer
            .run(exchange_id, |exchange, now| {
                exchange.ensure_not_frozen()?;

                let leg = exchange.leg(leg_id)?;
                leg.check_pickup(actor)?;
                self.limiter.check(leg_id)?;

                if !identity_verified {
                    warn!(party_id = %actor, "pickup refused: identity not verified");
                    return Err(SwapError::IdentityNotVerified);
                }
                if !self.issuer.validate(leg.credential(), leg_id, presented_code) {
                    warn!(party_id = %actor, "pickup refused: withdrawal code mismatch");
                    return Err(SwapError::CredentialMismatch);
                }

                exchange.leg_mut(leg_id)?.deliver(actor, now)?;
                info!("leg delivered");

                let mut events = vec![DeliveryEvent::LegDelivered {
                    exchange_id: exchange.id.clone(),
                    leg_id,
                }];
                if exchange.status() == ExchangeStatus::Completed {
                    info!("exchange completed");
                    events.push(DeliveryEvent::ExchangeCompleted {
                        exchange_id: exchange.id.clone(),
                    });
                }
                Ok(Applied::changed(LegStatus::Delivered, events))
            })
            .await?;
        Ok(status)
    }

    /// Any non-terminal state `→ lost`, reported by one of the parties.
    ///
    /// Opens a `ParcelLost` dispute in the same commit, which freezes the
    /// other leg until support resolves it.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, leg_id = %leg_id))]
    pub async fn report_loss(
        &self,
        exchange_id: &ExchangeId,
        leg_id: LegId,
        reporter: &PartyId,
        evidence: &str,
    ) -> OpResult<LegStatus> {
        let (status, _) = self
            .committer
            .run(exchange_id, |exchange, now| {
                if exchange.side_of(reporter).is_none() {
                    return Err(SwapError::Unauthorized(format!(
                        "{} is not a party to this exchange",
                        reporter
                    )));
                }
                apply_loss(exchange, leg_id, Reporter::Party(reporter.clone()), evidence, now)
            })
            .await?;
        Ok(status)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Queries and maintenance
    // ───────────────────────────────────────────────────────────────────────────

    /// Aggregate status, both legs and each party's next action.
    pub async fn get_status(&self, exchange_id: &ExchangeId) -> OpResult<StatusView> {
        let exchange = self.committer.load(exchange_id).await?;
        Ok(StatusView::from(&exchange))
    }

    /// Pulls the carrier's tracking state for a shipped leg and applies it:
    /// ready for pickup becomes an arrival, lost becomes a carrier loss report.
    ///
    /// The carrier is queried without holding the exchange lock. Returns the
    /// leg state after the sync.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, leg_id = %leg_id))]
    pub async fn sync_tracking(&self, exchange_id: &ExchangeId, leg_id: LegId) -> OpResult<LegStatus> {
        let exchange = self.committer.load(exchange_id).await?;
        let status = exchange.status();
        let leg = exchange.leg(leg_id).with_status(status)?;

        let tracking_ref = match (leg.status(), leg.tracking_ref.as_deref()) {
            (LegStatus::Shipped, Some(tracking_ref)) => tracking_ref.to_string(),
            (current, _) => return Ok(current),
        };

        let update = self
            .carrier
            .track_package(&tracking_ref)
            .await
            .map_err(|e| {
                warn!(error = %e, "tracking lookup failed");
                e
            })
            .with_status(status)?;

        let proof = format!("carrier:{}:{}", update.tracking_ref, update.detail);
        let (status, _) = match update.state {
            TrackingState::Pending | TrackingState::InTransit => return Ok(LegStatus::Shipped),
            TrackingState::ReadyForPickup => {
                self.committer
                    .run(exchange_id, |exchange, now| {
                        if exchange.leg(leg_id)?.status() != LegStatus::Shipped {
                            return Ok(Applied::unchanged(exchange.leg(leg_id)?.status()));
                        }
                        apply_arrival(exchange, leg_id, &proof, now)
                    })
                    .await?
            }
            TrackingState::Lost => {
                self.committer
                    .run(exchange_id, |exchange, now| {
                        if exchange.leg(leg_id)?.status() != LegStatus::Shipped {
                            return Ok(Applied::unchanged(exchange.leg(leg_id)?.status()));
                        }
                        apply_loss(exchange, leg_id, Reporter::Carrier, &proof, now)
                    })
                    .await?
            }
        };
        Ok(status)
    }

    /// Drops identity mappings whose retention window has passed. Returns how
    /// many mappings were removed across all exchanges.
    ///
    /// Also forgets pickup attempt buckets that have fully replenished.
    #[instrument(skip(self))]
    pub async fn purge_expired_mappings(&self, now: DateTime<Utc>) -> OpResult<usize> {
        let mut purged = 0;
        for exchange_id in self.store().list_exchanges().await? {
            let (count, _) = self
                .committer
                .run(&exchange_id, |exchange, _| {
                    let count = exchange.purge_expired_mappings(now);
                    Ok(if count > 0 {
                        Applied::changed(count, Vec::new())
                    } else {
                        Applied::unchanged(0)
                    })
                })
                .await?;
            purged += count;
        }
        self.limiter.shrink();
        debug!(tracked_legs = self.limiter.len(), "pickup attempt buckets shrunk");
        if purged > 0 {
            info!(purged, "expired identity mappings purged");
        }
        Ok(purged)
    }
}

impl std::fmt::Debug for DeliveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryOrchestrator")
            .field("locks", &self.committer.locks)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn apply_arrival(
    exchange: &mut Exchange,
    leg_id: LegId,
    arrival_proof: &str,
    now: DateTime<Utc>,
) -> Result<Applied<LegStatus>> {
    exchange.ensure_not_frozen()?;
    let arrival_proof = arrival_proof.trim();
    if arrival_proof.is_empty() {
        return Err(SwapError::MissingField("arrival_proof".into()));
    }

    let leg = exchange.leg_mut(leg_id)?;
    leg.arrive(arrival_proof, now)?;
    info!(pickup_point = %leg.pickup_point.id, "leg arrived");
    let pickup_point = leg.pickup_point.name.clone();

    let event = DeliveryEvent::LegArrived {
        exchange_id: exchange.id.clone(),
        leg_id,
        pickup_point,
    };
    Ok(Applied::changed(LegStatus::Arrived, vec![event]))
}

fn apply_loss(
    exchange: &mut Exchange,
    leg_id: LegId,
    reporter: Reporter,
    evidence: &str,
    now: DateTime<Utc>,
) -> Result<Applied<LegStatus>> {
    exchange.ensure_not_frozen()?;
    let evidence = evidence.trim();
    if evidence.is_empty() {
        return Err(SwapError::MissingField("evidence".into()));
    }

    exchange.leg_mut(leg_id)?.mark_lost(evidence, now)?;
    let dispute_id = raise_dispute(exchange, reporter, DisputeReason::ParcelLost { leg_id }, evidence, now)?;
    info!(dispute_id = %dispute_id, "leg lost, dispute opened");

    let events = vec![
        DeliveryEvent::LegLost {
            exchange_id: exchange.id.clone(),
            leg_id,
        },
        DeliveryEvent::DisputeOpened {
            exchange_id: exchange.id.clone(),
            dispute_id,
        },
    ];
    Ok(Applied::changed(LegStatus::Lost, events))
}
