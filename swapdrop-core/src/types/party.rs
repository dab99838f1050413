//! Real-world party data: names, contact channels and postal addresses.
//!
//! These values never leave the engine in clear text except inside a sealed
//! identity mapping or on the recipient's own delivery address line.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_ADDRESS_LINE_LEN;
use crate::error::{Result, SwapError};
use crate::types::PartyId;

/// A postal address in the shape carriers print on labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    /// Street and number
    pub line1: String,
    /// Optional: apartment, floor, building
    pub line2: Option<String>,
    /// City or locality
    pub city: String,
    /// Postal code, as entered
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
}

impl PostalAddress {
    /// Creates an address without a second line.
    pub fn new(
        line1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            line1: line1.into(),
            line2: None,
            city: city.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    /// Validates that the address is complete and printable on a carrier label.
    ///
    /// `context` prefixes the field name in [`SwapError::MissingField`], e.g.
    /// `"recipient.address"` yields `"recipient.address.postal_code"`.
    pub fn validate(&self, context: &str) -> Result<()> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SwapError::MissingField(format!("{}.{}", context, name)));
            }
        }

        for (name, value) in self.printable_fields() {
            if value.chars().any(char::is_control) {
                return Err(SwapError::ValidationError(format!(
                    "{}.{} contains control characters",
                    context, name
                )));
            }
            if value.chars().count() > MAX_ADDRESS_LINE_LEN {
                return Err(SwapError::ValidationError(format!(
                    "{}.{} exceeds {} characters",
                    context, name, MAX_ADDRESS_LINE_LEN
                )));
            }
        }

        Ok(())
    }

    /// Postal code upper-cased with internal whitespace removed.
    pub fn normalized_postal_code(&self) -> String {
        self.postal_code
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Canonical form used as a cache key: upper-cased, whitespace collapsed.
    pub fn normalized_key(&self) -> String {
        fn norm(s: &str) -> String {
            s.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase()
        }

        [
            norm(&self.line1),
            norm(self.line2.as_deref().unwrap_or_default()),
            norm(&self.city),
            self.normalized_postal_code(),
            norm(&self.country),
        ]
        .join("|")
    }

    /// Lines as printed on a label.
    pub fn label_lines(&self) -> Vec<String> {
        let mut lines = vec![self.line1.trim().to_string()];
        if let Some(line2) = self.line2.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            lines.push(line2.to_string());
        }
        lines.push(format!("{} {}", self.postal_code.trim(), self.city.trim()));
        lines.push(self.country.trim().to_uppercase());
        lines
    }

    fn printable_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("line1", self.line1.as_str()),
            ("city", self.city.as_str()),
            ("postal_code", self.postal_code.as_str()),
            ("country", self.country.as_str()),
        ];
        if let Some(line2) = &self.line2 {
            fields.push(("line2", line2.as_str()));
        }
        fields
    }
}

/// A party's real identity as known to the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealParty {
    /// Marketplace account
    pub id: PartyId,
    /// Legal or display name
    pub full_name: String,
    /// Optional: phone number
    pub phone: Option<String>,
    /// Optional: email address
    pub email: Option<String>,
    /// Home or delivery address
    pub address: PostalAddress,
}

impl RealParty {
    /// Validates name and address. `context` names the party in errors.
    pub fn validate(&self, context: &str) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(SwapError::MissingField(format!("{}.full_name", context)));
        }
        if self.full_name.chars().any(char::is_control) {
            return Err(SwapError::ValidationError(format!(
                "{}.full_name contains control characters",
                context
            )));
        }
        self.address.validate(&format!("{}.address", context))
    }
}
