//! Rejections returned by engine operations.

use thiserror::Error;

use swapdrop_core::error::SwapError;
use swapdrop_core::types::ExchangeStatus;

/// Result type of orchestrator and dispute operations.
pub type OpResult<T> = std::result::Result<T, Rejection>;

/// A refused operation: the specific error plus the exchange's unchanged
/// aggregate status, when the exchange could be read.
///
/// Callers use the pair to decide whether to retry, tell the party to wait
/// for the counterpart, or escalate to a dispute.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejection {
    /// What went wrong
    pub error: SwapError,
    /// Aggregate status at the time of the refusal
    pub aggregate_status: Option<ExchangeStatus>,
}

impl Rejection {
    /// Pairs an error with the status observed before it.
    pub fn new(error: SwapError, aggregate_status: Option<ExchangeStatus>) -> Self {
        Self { error, aggregate_status }
    }

    /// Stable machine code of the underlying error.
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

impl From<SwapError> for Rejection {
    fn from(error: SwapError) -> Self {
        Self::new(error, None)
    }
}

/// Attaches a known status to a plain `Result`.
pub(crate) trait WithStatus<T> {
    fn with_status(self, status: ExchangeStatus) -> OpResult<T>;
}

impl<T> WithStatus<T> for swapdrop_core::error::Result<T> {
    fn with_status(self, status: ExchangeStatus) -> OpResult<T> {
        self.map_err(|e| Rejection::new(e, Some(status)))
    }
}
