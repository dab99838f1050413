//! # Swapdrop Core
//!
//! Core types, errors, and collaborator traits for the Swapdrop delivery engine.
//!
//! This crate provides the foundational building blocks used by all other Swapdrop crates:
//!
//! - **Types**: Exchanges, delivery legs, withdrawal credentials, anonymized identities,
//!   pickup points and disputes
//! - **Errors**: The rejection taxonomy shared by every component
//! - **Constants**: Domain separators, code formats and operational defaults
//! - **Traits**: Narrow interfaces to storage, carrier, notification and support tooling
//!
//! ## Example
//!
//! ```rust
//! use swapdrop_core::{aggregate_status, ExchangeStatus, LegStatus};
//!
//! let status = aggregate_status(LegStatus::Shipped, LegStatus::LabelGenerated);
//! assert_eq!(status, ExchangeStatus::PartialShipped);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{Result, SwapError};
pub use traits::*;
pub use types::*;
