//! Error types for Swapdrop.
//!
//! Every rejection the engine can produce is a distinct variant, so callers can
//! decide whether to retry, wait for the counterpart, or escalate to a dispute.

use thiserror::Error;

use crate::types::LegStatus;

/// Result type alias using `SwapError`.
pub type Result<T> = std::result::Result<T, SwapError>;

/// Main error type for all Swapdrop operations.
#[derive(Debug, Error)]
pub enum SwapError {
    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A required field was missing or blank.
    #[error("Missing required field: {0}")]
    MissingField(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE MACHINE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The leg's current state (or the caller) does not permit the operation.
    #[error("Invalid transition: cannot {operation} a leg in state '{status}': {reason}")]
    InvalidTransition {
        /// Operation that was attempted
        operation: &'static str,
        /// Leg state at the time of the attempt
        status: LegStatus,
        /// Why the transition was refused
        reason: String,
    },

    /// The leg was already shipped under a different tracking reference.
    #[error("Tracking conflict: leg already shipped as '{existing}', got '{presented}'")]
    TrackingConflict {
        /// Tracking reference recorded on the leg
        existing: String,
        /// Tracking reference presented by the caller
        presented: String,
    },

    /// The presented withdrawal code does not match the leg's credential.
    #[error("Withdrawal code does not match")]
    CredentialMismatch,

    /// The pickup point did not verify the holder's identity.
    #[error("Recipient identity was not verified at the pickup point")]
    IdentityNotVerified,

    /// Too many pickup attempts on one leg.
    #[error("Too many pickup attempts, retry in {retry_after_secs}s")]
    TooManyAttempts {
        /// Seconds until the next attempt is allowed
        retry_after_secs: u64,
    },

    /// The exchange has an open dispute and its legs are read-only.
    #[error("Exchange is frozen by dispute {dispute_id}")]
    ExchangeFrozen {
        /// Open dispute holding the freeze
        dispute_id: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Exchange not found.
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    /// Leg not found in the exchange.
    #[error("Delivery leg not found: {0}")]
    LegNotFound(String),

    /// Dispute not found on the exchange.
    #[error("Dispute not found: {0}")]
    DisputeNotFound(String),

    /// An exchange with this ID already has deliveries.
    #[error("Exchange already has deliveries: {0}")]
    DuplicateExchange(String),

    /// No pickup point serves the target address within the search radius.
    #[error("No pickup point available for postal code '{postal_code}' within {radius_km} km")]
    NoPickupPointAvailable {
        /// Postal code of the target address
        postal_code: String,
        /// Search radius that was used
        radius_km: u32,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // DISPUTE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A dispute is already open on the exchange.
    #[error("Dispute {0} is already open")]
    DisputeAlreadyOpen(String),

    /// The dispute is not open (already resolved).
    #[error("Dispute {0} is not open")]
    DisputeNotOpen(String),

    /// The operator is not allowed to perform the action.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The support-side key is unavailable or encryption failed. Never degrades to plaintext.
    #[error("Encryption unavailable: {0}")]
    EncryptionUnavailable(String),

    /// Sealed mapping could not be opened.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key size.
    #[error("Invalid key: expected at least {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Required size
        expected: usize,
        /// Provided size
        actual: usize,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLABORATOR ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Carrier gateway call failed.
    #[error("Carrier error: {0}")]
    CarrierError(String),

    /// Notification delivery failed.
    #[error("Notification error: {0}")]
    NotificationError(String),

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Optimistic concurrency check failed.
    #[error("Version conflict: expected version {expected}, found {actual}")]
    VersionConflict {
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Binary serialization error.
    #[error("Binary serialization error: {0}")]
    BinarySerializationError(String),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    /// Format version mismatch.
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Supported version
        expected: u8,
        /// Version found
        actual: u8,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SwapError {
    /// Returns true if this error is recoverable (can retry as-is).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SwapError::CarrierError(_)
                | SwapError::NotificationError(_)
                | SwapError::StorageError(_)
                | SwapError::VersionConflict { .. }
                | SwapError::TooManyAttempts { .. }
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            SwapError::ValidationError(_) | SwapError::MissingField(_)
        )
    }

    /// Returns true if the operation was refused by a state or credential rule.
    ///
    /// Rejections never mutate state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SwapError::InvalidTransition { .. }
                | SwapError::TrackingConflict { .. }
                | SwapError::CredentialMismatch
                | SwapError::IdentityNotVerified
                | SwapError::TooManyAttempts { .. }
                | SwapError::ExchangeFrozen { .. }
        )
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SwapError::ValidationError(_) | SwapError::MissingField(_) => "VALIDATION_ERROR",
            SwapError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SwapError::TrackingConflict { .. } => "TRACKING_CONFLICT",
            SwapError::CredentialMismatch => "CREDENTIAL_MISMATCH",
            SwapError::IdentityNotVerified => "IDENTITY_NOT_VERIFIED",
            SwapError::TooManyAttempts { .. } => "TOO_MANY_ATTEMPTS",
            SwapError::ExchangeFrozen { .. } => "EXCHANGE_FROZEN",
            SwapError::ExchangeNotFound(_)
            | SwapError::LegNotFound(_)
            | SwapError::DisputeNotFound(_) => "NOT_FOUND",
            SwapError::DuplicateExchange(_) => "DUPLICATE_EXCHANGE",
            SwapError::NoPickupPointAvailable { .. } => "NO_PICKUP_POINT_AVAILABLE",
            SwapError::DisputeAlreadyOpen(_) => "DISPUTE_ALREADY_OPEN",
            SwapError::DisputeNotOpen(_) => "DISPUTE_NOT_OPEN",
            SwapError::Unauthorized(_) => "UNAUTHORIZED",
            SwapError::EncryptionUnavailable(_) => "ENCRYPTION_UNAVAILABLE",
            SwapError::DecryptionFailed(_) | SwapError::InvalidKeySize { .. } => "CRYPTO_ERROR",
            SwapError::CarrierError(_) => "CARRIER_ERROR",
            SwapError::NotificationError(_) => "NOTIFICATION_ERROR",
            SwapError::VersionConflict { .. } => "VERSION_CONFLICT",
            _ => "INTERNAL_ERROR",
        }
    }
}
