//! Dispute handling.
//!
//! An open dispute freezes both legs of its exchange: every leg transition is
//! refused with `ExchangeFrozen` until a support operator resolves it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::{ExchangeStore, Notifier, SupportAction, SupportAuthorizer};
use swapdrop_core::types::{
    AnonymizedIdentity, DeliveryEvent, Dispute, DisputeId, DisputeOutcome, DisputeReason,
    DisputeResolution, Exchange, ExchangeId, MappingRecord, OperatorId, PartyId, Reporter,
};
use swapdrop_privacy::SupportDecryptor;

use crate::commit::{Applied, Committer};
use crate::error::{OpResult, WithStatus};
use crate::locks::ExchangeLocks;
use crate::status::StatusView;

/// Records a new open dispute on `exchange`.
///
/// Fails with `DisputeAlreadyOpen` if one is open already.
pub(crate) fn raise_dispute(
    exchange: &mut Exchange,
    reporter: Reporter,
    reason: DisputeReason,
    evidence: &str,
    at: DateTime<Utc>,
) -> Result<DisputeId> {
    if let Some(open) = exchange.open_dispute() {
        return Err(SwapError::DisputeAlreadyOpen(open.id.to_string()));
    }
    let evidence = evidence.trim();
    if evidence.is_empty() {
        return Err(SwapError::MissingField("evidence".into()));
    }

    let dispute = Dispute::open(reporter, reason, evidence, at);
    let id = dispute.id;
    exchange.disputes.push(dispute);
    Ok(id)
}

/// Opens, resolves and investigates disputes.
pub struct DisputeHandler {
    committer: Committer,
    authorizer: Arc<dyn SupportAuthorizer>,
    decryptor: Option<SupportDecryptor>,
}

impl DisputeHandler {
    /// Creates a handler. `locks` must be the orchestrator's lock table.
    ///
    /// Without a decryptor, [`reveal_identities`](Self::reveal_identities)
    /// fails with `EncryptionUnavailable`.
    pub fn new(
        store: Arc<dyn ExchangeStore>,
        locks: ExchangeLocks,
        notifier: Arc<dyn Notifier>,
        authorizer: Arc<dyn SupportAuthorizer>,
        decryptor: Option<SupportDecryptor>,
        retention: Duration,
    ) -> Self {
        Self {
            committer: Committer {
                store,
                notifier,
                locks,
                retention,
            },
            authorizer,
            decryptor,
        }
    }

    /// Opens a dispute on behalf of one of the exchange's parties and freezes
    /// the exchange.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, reporter = %reporter))]
    pub async fn open_dispute(
        &self,
        exchange_id: &ExchangeId,
        reporter: &PartyId,
        reason: DisputeReason,
        evidence: &str,
    ) -> OpResult<DisputeId> {
        let (dispute_id, _) = self
            .committer
            .run(exchange_id, |exchange, now| {
                if exchange.side_of(reporter).is_none() {
                    return Err(SwapError::Unauthorized(format!(
                        "{} is not a party to this exchange",
                        reporter
                    )));
                }
                if let DisputeReason::ParcelLost { leg_id } = &reason {
                    exchange.leg(*leg_id)?;
                }

                let dispute_id =
                    raise_dispute(exchange, Reporter::Party(reporter.clone()), reason, evidence, now)?;
                info!(dispute_id = %dispute_id, "dispute opened");

                let event = DeliveryEvent::DisputeOpened {
                    exchange_id: exchange.id.clone(),
                    dispute_id,
                };
                Ok(Applied::changed(dispute_id, vec![event]))
            })
            .await?;
        Ok(dispute_id)
    }

    /// Closes an open dispute with `outcome`. Restricted to authorized operators.
    ///
    /// - `ReleaseGoods`: the exchange is unfrozen, legs continue
    /// - `Compensate`: as above, and the exchange is marked compensated
    /// - `CancelExchange`: every leg not yet terminal is cancelled
    #[instrument(skip_all, fields(exchange_id = %exchange_id, dispute_id = %dispute_id, operator = %operator))]
    pub async fn resolve_dispute(
        &self,
        exchange_id: &ExchangeId,
        dispute_id: DisputeId,
        operator: &OperatorId,
        outcome: DisputeOutcome,
    ) -> OpResult<StatusView> {
        self.authorizer.authorize(operator, SupportAction::ResolveDispute)?;

        let (_, stored) = self
            .committer
            .run(exchange_id, |exchange, now| {
                let dispute = exchange
                    .disputes
                    .iter_mut()
                    .find(|d| d.id == dispute_id)
                    .ok_or_else(|| SwapError::DisputeNotFound(dispute_id.to_string()))?;
                if !dispute.is_open() {
                    return Err(SwapError::DisputeNotOpen(dispute_id.to_string()));
                }
                dispute.resolution = Some(DisputeResolution {
                    outcome,
                    operator: operator.clone(),
                    resolved_at: now,
                });

                match outcome {
                    DisputeOutcome::ReleaseGoods => {}
                    DisputeOutcome::Compensate => exchange.compensated = true,
                    DisputeOutcome::CancelExchange => {
                        for leg in [&mut exchange.leg_a, &mut exchange.leg_b] {
                            if !leg.status().is_terminal() {
                                leg.cancel(now)?;
                            }
                        }
                    }
                }
                info!(?outcome, status = %exchange.status(), "dispute resolved");

                let event = DeliveryEvent::DisputeResolved {
                    exchange_id: exchange.id.clone(),
                    dispute_id,
                    outcome,
                };
                Ok(Applied::changed((), vec![event]))
            })
            .await?;
        Ok(StatusView::from(&stored))
    }

    /// Decrypts both parties' identity mappings for an operator investigating
    /// an open dispute. Returns party A's record, then party B's.
    ///
    /// Read-only: the exchange is not modified and no party is notified.
    #[instrument(skip_all, fields(exchange_id = %exchange_id, operator = %operator))]
    pub async fn reveal_identities(
        &self,
        exchange_id: &ExchangeId,
        operator: &OperatorId,
    ) -> OpResult<(MappingRecord, MappingRecord)> {
        self.authorizer.authorize(operator, SupportAction::RevealIdentities)?;

        let exchange = self.committer.load(exchange_id).await?;
        let status = exchange.status();

        if exchange.open_dispute().is_none() {
            return Err(SwapError::DisputeNotOpen(format!(
                "no open dispute on exchange {}",
                exchange_id
            )))
            .with_status(status);
        }
        let decryptor = self
            .decryptor
            .as_ref()
            .ok_or_else(|| SwapError::EncryptionUnavailable("no support key configured".into()))
            .with_status(status)?;

        let reveal = |identity: &AnonymizedIdentity| -> Result<MappingRecord> {
            let mapping = identity.mapping.as_ref().ok_or_else(|| {
                SwapError::DecryptionFailed(format!("mapping for {} was purged", identity.pseudonym))
            })?;
            decryptor.reveal(operator, mapping).map_err(|e| {
                warn!(pseudonym = %identity.pseudonym, error = %e, "identity reveal refused");
                e
            })
        };
        let party_a = reveal(&exchange.identity_a).with_status(status)?;
        let party_b = reveal(&exchange.identity_b).with_status(status)?;
        Ok((party_a, party_b))
    }
}

impl std::fmt::Debug for DisputeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisputeHandler")
            .field("decryptor", &self.decryptor)
            .finish_non_exhaustive()
    }
}
