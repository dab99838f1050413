//! Identifier newtypes.
//!
//! Exchange, party and item IDs come from the marketplace and are opaque
//! strings. Leg and dispute IDs are minted here.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SwapError};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an ID, rejecting blank values.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(SwapError::MissingField($field.into()));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Marketplace identifier of an accepted exchange.
    ExchangeId,
    "exchange_id"
);
string_id!(
    /// Marketplace identifier of a party (account).
    PartyId,
    "party_id"
);
string_id!(
    /// Marketplace identifier of a swapped item.
    ItemId,
    "item_id"
);
string_id!(
    /// Identifier of a support operator.
    OperatorId,
    "operator_id"
);

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mints a fresh random ID.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an ID from its hyphenated string form.
            pub fn parse(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| SwapError::ValidationError(format!("invalid {}: {}", stringify!($name), e)))
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identifier of one delivery leg.
    LegId
);
uuid_id!(
    /// Identifier of a dispute.
    DisputeId
);
