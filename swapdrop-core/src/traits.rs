//! Collaborator interfaces for Swapdrop.
//!
//! The delivery engine depends only on these traits; storage engines, carrier
//! APIs, notification channels and operator tooling plug in behind them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DeliveryEvent, Exchange, ExchangeId, LabelRequest, OperatorId, PartyId, PickupCandidate,
    PostalAddress, ShippingLabel, TrackingUpdate,
};

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for exchange persistence.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - A local file (single-node deployments)
/// - A relational database (production)
#[async_trait]
pub trait ExchangeStore: Send + Sync {
    /// Inserts a new exchange. Fails with `DuplicateExchange` if the ID exists.
    ///
    /// The stored record gets version 1.
    async fn insert_exchange(&self, exchange: Exchange) -> Result<Exchange>;

    /// Loads an exchange by ID.
    async fn load_exchange(&self, id: &ExchangeId) -> Result<Option<Exchange>>;

    /// Replaces an exchange if its stored version still equals `exchange.version`.
    ///
    /// Returns the stored record with its version bumped. Fails with
    /// `VersionConflict` otherwise, leaving the stored record untouched.
    async fn save_exchange(&self, exchange: Exchange) -> Result<Exchange>;

    /// Lists all exchange IDs.
    async fn list_exchanges(&self) -> Result<Vec<ExchangeId>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CARRIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface to a parcel carrier.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Creates a shipping label for an anonymized leg.
    async fn create_shipping_label(&self, request: &LabelRequest) -> Result<ShippingLabel>;

    /// Returns the latest tracking state of a parcel.
    async fn track_package(&self, tracking_ref: &str) -> Result<TrackingUpdate>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NOTIFICATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fire-and-forget notification channel.
///
/// Failures are logged by the caller and never undo a committed transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends an event to a party.
    async fn notify(&self, party: &PartyId, event: &DeliveryEvent) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PICKUP POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of pickup-point candidates (catalog, partner API).
#[async_trait]
pub trait PickupPointProvider: Send + Sync {
    /// Returns candidate points near `target`, within `radius_km`.
    ///
    /// Providers may return points outside the radius or service area; the
    /// directory filters them.
    async fn candidates(&self, target: &PostalAddress, radius_km: u32) -> Result<Vec<PickupCandidate>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORT AUTHORIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Actions restricted to support operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupportAction {
    /// Close a dispute with an outcome
    ResolveDispute,
    /// Decrypt the identity mappings of a disputed exchange
    RevealIdentities,
}

/// Authorization check for support-side operations.
pub trait SupportAuthorizer: Send + Sync {
    /// Returns `Ok(())` if `operator` may perform `action`, `Unauthorized` otherwise.
    fn authorize(&self, operator: &OperatorId, action: SupportAction) -> Result<()>;
}
