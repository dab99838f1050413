//! # Swapdrop Store
//!
//! Exchange persistence for the Swapdrop delivery engine.
//!
//! This crate provides two backends for [`ExchangeStore`]:
//!
//! - **Memory**: Concurrent in-memory storage for development and testing
//! - **File**: Durable single-file storage for single-node deployments
//!
//! Both implement optimistic concurrency: a save succeeds only if the stored
//! version still equals the version the caller loaded.
//!
//! ## Example
//!
//! ```rust,ignore
//! use swapdrop_store::{ExchangeStore, MemoryExchangeStore};
//!
//! let store = MemoryExchangeStore::new();
//! let stored = store.insert_exchange(exchange).await?;
//! assert_eq!(stored.version, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;
mod file;

pub use memory::MemoryExchangeStore;
pub use file::FileExchangeStore;

// Re-export the trait from core
pub use swapdrop_core::traits::ExchangeStore;
