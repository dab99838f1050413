//! Wires the orchestrator and dispute handler from one configuration.

use std::sync::Arc;

use tracing::{info, warn};

use swapdrop_core::error::Result;
use swapdrop_core::traits::{CarrierGateway, ExchangeStore, Notifier, PickupPointProvider, SupportAuthorizer};
use swapdrop_crypto::MappingSealer;
use swapdrop_pickup::PickupPointDirectory;
use swapdrop_privacy::{CredentialIssuer, IdentityAnonymizer, SupportDecryptor};

use crate::authorizer::StaticAuthorizer;
use crate::config::EngineConfig;
use crate::dispute::DisputeHandler;
use crate::locks::ExchangeLocks;
use crate::orchestrator::DeliveryOrchestrator;

/// A ready-to-use delivery engine.
///
/// Both halves share one store and one lock table, so dispute operations and
/// leg transitions on the same exchange are serialized.
#[derive(Debug)]
pub struct Engine {
    /// Leg transitions and status
    pub orchestrator: Arc<DeliveryOrchestrator>,
    /// Dispute lifecycle and identity reveal
    pub disputes: Arc<DisputeHandler>,
}

impl Engine {
    /// Builds an engine. Support operators come from `config.support_operators`.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn ExchangeStore>,
        carrier: Arc<dyn CarrierGateway>,
        notifier: Arc<dyn Notifier>,
        provider: Arc<dyn PickupPointProvider>,
    ) -> Result<Self> {
        let authorizer = Arc::new(StaticAuthorizer::new(config.support_operators.iter().cloned()));
        Self::with_authorizer(config, store, carrier, notifier, provider, authorizer)
    }

    /// Builds an engine around a custom support authorizer.
    pub fn with_authorizer(
        config: &EngineConfig,
        store: Arc<dyn ExchangeStore>,
        carrier: Arc<dyn CarrierGateway>,
        notifier: Arc<dyn Notifier>,
        provider: Arc<dyn PickupPointProvider>,
        authorizer: Arc<dyn SupportAuthorizer>,
    ) -> Result<Self> {
        config.relay.validate()?;

        let secret = Arc::new(config.server_secret.clone());
        let sealer = config.support_key.clone().map(MappingSealer::new);
        if sealer.is_none() {
            warn!("no support key configured: new deliveries will be refused");
        }

        let locks = ExchangeLocks::new();
        let directory = Arc::new(PickupPointDirectory::new(provider, config.directory.clone()));
        let anonymizer = IdentityAnonymizer::new(secret.clone(), sealer.clone(), config.relay.clone());
        let issuer = CredentialIssuer::new(secret);

        let orchestrator = DeliveryOrchestrator::new(
            store.clone(),
            carrier,
            notifier.clone(),
            directory,
            anonymizer,
            issuer,
            locks.clone(),
            &config.orchestrator,
        )?;
        let decryptor = sealer.map(|sealer| SupportDecryptor::new(sealer, authorizer.clone()));
        let disputes = DisputeHandler::new(
            store,
            locks,
            notifier,
            authorizer,
            decryptor,
            config.orchestrator.retention(),
        );

        info!(
            radius_km = config.directory.radius_km,
            retention_days = config.orchestrator.mapping_retention_days,
            operators = config.support_operators.len(),
            "delivery engine ready"
        );
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            disputes: Arc::new(disputes),
        })
    }
}
