//! Protocol constants for Swapdrop.
//!
//! Code formats are part of what pickup-point staff and parties copy by hand,
//! so they are deliberately short and drawn from an unambiguous alphabet.

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN SEPARATORS
// ═══════════════════════════════════════════════════════════════════════════════
// Each keyed SHAKE256 invocation uses a unique domain separator so pseudonyms,
// withdrawal codes and mapping bindings never collide, even with same inputs.

/// Domain separator for pseudonym derivation.
pub const DOMAIN_PSEUDONYM: &[u8] = b"SWAPDROP_PSEUDONYM_V1";

/// Domain separator for withdrawal code derivation.
pub const DOMAIN_WITHDRAWAL_CODE: &[u8] = b"SWAPDROP_WITHDRAWAL_CODE_V1";

/// Domain separator for the associated data bound into sealed mappings.
pub const DOMAIN_MAPPING_AAD: &[u8] = b"SWAPDROP_MAPPING_AAD_V1";

// ═══════════════════════════════════════════════════════════════════════════════
// HUMAN-COPYABLE CODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Alphabet for pseudonyms and withdrawal codes.
///
/// 32 symbols (no `0`, `O`, `1`, `I`), so every byte maps without modulo bias.
pub const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Prefix of every pseudonym token.
pub const PSEUDONYM_PREFIX: &str = "SWP-";

/// Number of alphabet characters after the pseudonym prefix.
pub const PSEUDONYM_LENGTH: usize = 10;

/// Prefix of every withdrawal code.
pub const WITHDRAWAL_CODE_PREFIX: &str = "WD-";

/// Number of alphabet characters after the withdrawal code prefix.
pub const WITHDRAWAL_CODE_LENGTH: usize = 8;

/// Size of the random issuance nonce mixed into each withdrawal code.
pub const ISSUANCE_NONCE_SIZE: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY MATERIAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum size of the process-wide server secret in bytes.
pub const SERVER_SECRET_MIN_SIZE: usize = 32;

/// Size of the support-side AES-256-GCM key in bytes.
pub const SUPPORT_KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce prepended to every sealed mapping.
pub const MAPPING_NONCE_SIZE: usize = 12;

/// Current sealed mapping format version.
pub const MAPPING_VERSION: u8 = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTACT REDACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Characters kept visible at each end of a masked contact value.
pub const MASK_VISIBLE_CHARS: usize = 2;

/// Character used for masked positions.
pub const MASK_CHAR: char = '*';

/// Longest address line a carrier label accepts.
pub const MAX_ADDRESS_LINE_LEN: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONAL DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default pickup-point search radius.
pub const DEFAULT_PICKUP_RADIUS_KM: u32 = 15;

/// Default window during which the same normalized address resolves to the same point.
pub const DEFAULT_PICKUP_CACHE_TTL_SECS: u64 = 3600;

/// Default capacity of the pickup-point resolution cache.
pub const DEFAULT_PICKUP_CACHE_ENTRIES: usize = 10_000;

/// Default retention of identity mappings after an exchange closes.
pub const DEFAULT_MAPPING_RETENTION_DAYS: i64 = 90;

/// Default number of pickup attempts allowed per leg within one window.
pub const DEFAULT_PICKUP_ATTEMPTS_PER_WINDOW: u32 = 5;

/// Default pickup attempt window.
pub const DEFAULT_PICKUP_ATTEMPT_WINDOW_SECS: u64 = 900;
