//! # Swapdrop Privacy Layer
//!
//! Everything that stands between a party's real identity and the documents
//! the carrier and the counterpart get to see.
//!
//! This crate provides:
//!
//! - **Anonymization**: Deterministic per-exchange pseudonyms, relay sender cards,
//!   recipient cards with relayed or masked channels, sealed identity mappings
//! - **Credentials**: Issuance and constant-time validation of withdrawal codes
//! - **Support access**: Authorization-gated decryption of identity mappings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use swapdrop_privacy::{IdentityAnonymizer, RelayConfig};
//!
//! let anonymizer = IdentityAnonymizer::new(secret, Some(sealer), RelayConfig::default());
//! let identity = anonymizer.anonymize(&exchange_id, &real_party, Utc::now())?;
//! println!("ships as {}", identity.pseudonym);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod anonymizer;
pub mod credential;
pub mod mask;
pub mod support;

pub use anonymizer::{IdentityAnonymizer, RelayConfig};
pub use credential::CredentialIssuer;
pub use mask::mask_contact;
pub use support::SupportDecryptor;
