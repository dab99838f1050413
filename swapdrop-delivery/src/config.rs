//! Engine configuration.
//!
//! Loaded from the environment (and a `.env` file when present):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SWAPDROP_SERVER_SECRET` | required, hex, at least 32 bytes |
//! | `SWAPDROP_SUPPORT_KEY` | unset: anonymization fails closed |
//! | `SWAPDROP_RELAY_NAME`, `_LINE1`, `_CITY`, `_POSTAL_CODE`, `_COUNTRY` | built-in relay |
//! | `SWAPDROP_RELAY_PHONE`, `SWAPDROP_RELAY_EMAIL_DOMAIN` | none / built-in domain |
//! | `SWAPDROP_PICKUP_RADIUS_KM` | 15 |
//! | `SWAPDROP_PICKUP_CACHE_TTL_SECS` | 3600 |
//! | `SWAPDROP_MAPPING_RETENTION_DAYS` | 90 |
//! | `SWAPDROP_PICKUP_ATTEMPTS_PER_WINDOW` | 5 |
//! | `SWAPDROP_PICKUP_ATTEMPT_WINDOW_SECS` | 900 |
//! | `SWAPDROP_SUPPORT_OPERATORS` | empty |

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use swapdrop_core::constants::DEFAULT_MAPPING_RETENTION_DAYS;
use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::types::OperatorId;
use swapdrop_crypto::{ServerSecret, SupportKey};
use swapdrop_pickup::DirectoryConfig;
use swapdrop_privacy::RelayConfig;

use crate::limiter::LimiterConfig;

/// Orchestrator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Days identity mappings are kept after both legs close
    pub mapping_retention_days: i64,
    /// Pickup attempt budget
    pub limiter: LimiterConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mapping_retention_days: DEFAULT_MAPPING_RETENTION_DAYS,
            limiter: LimiterConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Retention as a duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.mapping_retention_days)
    }
}

/// Everything needed to build an [`Engine`](crate::Engine).
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Keys pseudonyms and withdrawal codes
    pub server_secret: ServerSecret,
    /// Seals identity mappings; `None` disables anonymization
    pub support_key: Option<SupportKey>,
    /// Relay identity printed for senders
    pub relay: RelayConfig,
    /// Pickup-point directory settings
    pub directory: DirectoryConfig,
    /// Orchestrator settings
    pub orchestrator: OrchestratorConfig,
    /// Operators allowed to resolve disputes and reveal identities
    pub support_operators: Vec<OperatorId>,
}

impl EngineConfig {
    /// Default settings around the given secret.
    pub fn new(server_secret: ServerSecret, support_key: Option<SupportKey>) -> Self {
        Self {
            server_secret,
            support_key,
            relay: RelayConfig::default(),
            directory: DirectoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            support_operators: Vec::new(),
        }
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secret_hex = var("SWAPDROP_SERVER_SECRET")
            .ok_or_else(|| SwapError::ConfigError("SWAPDROP_SERVER_SECRET is not set".into()))?;
        let server_secret = ServerSecret::from_hex(&secret_hex)
            .map_err(|e| SwapError::ConfigError(format!("SWAPDROP_SERVER_SECRET: {}", e)))?;
        let support_key = var("SWAPDROP_SUPPORT_KEY")
            .map(|hex| SupportKey::from_hex(&hex))
            .transpose()
            .map_err(|e| SwapError::ConfigError(format!("SWAPDROP_SUPPORT_KEY: {}", e)))?;

        let mut config = Self::new(server_secret, support_key);

        let relay = &mut config.relay;
        if let Some(v) = var("SWAPDROP_RELAY_NAME") {
            relay.name = v;
        }
        if let Some(v) = var("SWAPDROP_RELAY_LINE1") {
            relay.address.line1 = v;
        }
        if let Some(v) = var("SWAPDROP_RELAY_CITY") {
            relay.address.city = v;
        }
        if let Some(v) = var("SWAPDROP_RELAY_POSTAL_CODE") {
            relay.address.postal_code = v;
        }
        if let Some(v) = var("SWAPDROP_RELAY_COUNTRY") {
            relay.address.country = v;
        }
        if let Some(v) = var("SWAPDROP_RELAY_PHONE") {
            relay.phone = Some(v);
        }
        if let Some(v) = var("SWAPDROP_RELAY_EMAIL_DOMAIN") {
            relay.email_domain = Some(v);
        }
        relay
            .validate()
            .map_err(|e| SwapError::ConfigError(format!("relay identity: {}", e)))?;

        config.directory.radius_km = parse(&var, "SWAPDROP_PICKUP_RADIUS_KM", config.directory.radius_km)?;
        config.directory.cache.ttl_seconds =
            parse(&var, "SWAPDROP_PICKUP_CACHE_TTL_SECS", config.directory.cache.ttl_seconds)?;

        let orchestrator = &mut config.orchestrator;
        orchestrator.mapping_retention_days = parse(
            &var,
            "SWAPDROP_MAPPING_RETENTION_DAYS",
            orchestrator.mapping_retention_days,
        )?;
        orchestrator.limiter.attempts_per_window = parse(
            &var,
            "SWAPDROP_PICKUP_ATTEMPTS_PER_WINDOW",
            orchestrator.limiter.attempts_per_window,
        )?;
        orchestrator.limiter.window_secs = parse(
            &var,
            "SWAPDROP_PICKUP_ATTEMPT_WINDOW_SECS",
            orchestrator.limiter.window_secs,
        )?;
        if orchestrator.mapping_retention_days < 0 {
            return Err(SwapError::ConfigError(
                "SWAPDROP_MAPPING_RETENTION_DAYS must not be negative".into(),
            ));
        }

        config.support_operators = var("SWAPDROP_SUPPORT_OPERATORS")
            .map(|list| list.split(',').filter_map(|s| OperatorId::new(s).ok()).collect())
            .unwrap_or_default();

        Ok(config)
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| SwapError::ConfigError(format!("{}: {}", name, e))),
        None => Ok(default),
    }
}
