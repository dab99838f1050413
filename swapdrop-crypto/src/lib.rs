//! # Swapdrop Cryptography
//!
//! Keyed primitives behind pseudonyms, withdrawal codes and identity mappings.
//!
//! This crate provides:
//!
//! - **Hash**: SHAKE256 with domain separation, keyed by the server secret
//! - **Codes**: Bias-free encoding of hash output into human-copyable codes
//! - **Secrets**: The process-wide server secret and the support-side key
//! - **Sealing**: AES-256-GCM encryption of identity mappings
//!
//! ## Security Properties
//!
//! - Pseudonyms and codes are keyed: without the server secret they are unpredictable
//! - Code comparison is constant-time
//! - Secret material is zeroized on drop and redacted from `Debug`
//! - Sealing fails closed: there is no plaintext fallback
//!
//! ## Example
//!
//! ```rust,ignore
//! use swapdrop_crypto::{derive_pseudonym, ServerSecret};
//!
//! let secret = ServerSecret::generate();
//! let pseudonym = derive_pseudonym(&secret, "alice", "exchange-42");
//! assert!(pseudonym.starts_with("SWP-"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod hash;
pub mod code;
pub mod secret;
pub mod seal;

// Re-export main functions at crate root
pub use hash::{keyed_shake256, shake256, shake256_multi};
pub use code::{codes_match, derive_pseudonym, derive_withdrawal_code, encode_code};
pub use secret::{ServerSecret, SupportKey};
pub use seal::MappingSealer;
