//! Process-wide secret material.
//!
//! # Lifecycle
//!
//! 1. At startup, [`SecretSet::from_config`] decodes and validates every key.
//! 2. The set is wrapped in an `Arc` and handed to each component at
//!    construction. It is never mutated afterwards, so concurrent readers need
//!    no locking.
//! 3. Key buffers are zeroed when the last reference is dropped.
//!
//! # Security invariants
//!
//! - Key material is **never** logged or included in traces; every holder
//!   prints as `[REDACTED]`.
//! - The encryption, HMAC and integrity keys must be pairwise distinct.

pub mod secret;

pub use secret::{SecretKey, SecretSet};

use thiserror::Error;
use vault_common::VaultError;

/// Minimum byte length accepted for the HMAC and integrity keys.
pub const MIN_MAC_KEY_LEN: usize = 32;

/// Errors raised while assembling secret material. All are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required secret was absent or empty.
    #[error("{0} is required and must not be empty")]
    Missing(&'static str),

    /// A secret was not valid base64.
    #[error("{0} must be base64-encoded")]
    Malformed(&'static str),

    /// A secret decoded to the wrong number of bytes.
    #[error("{name} must be exactly {expected} bytes, got {actual}")]
    WrongLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A secret decoded to too few bytes.
    #[error("{name} must be at least {min} bytes, got {actual}")]
    TooShort {
        name: &'static str,
        min: usize,
        actual: usize,
    },

    /// Two of the three keys are identical.
    #[error("ENCRYPTION_KEY, HMAC_KEY and INTEGRITY_KEY must all be distinct")]
    KeysNotDistinct,
}

impl From<ConfigError> for VaultError {
    fn from(e: ConfigError) -> Self {
        VaultError::Config(e.to_string())
    }
}
