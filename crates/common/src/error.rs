//! Common error types shared across crates.

use thiserror::Error;

/// Top-level vault error type.
///
/// Verification failures are not errors: a row that fails its integrity check
/// is reported as [`crate::Verdict::Fake`]. Only [`VaultError::Config`] is fatal;
/// every other variant is recoverable by the caller.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Secret material or configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value could not be encrypted or a tag could not be produced.
    #[error("encryption failure: {0}")]
    Encryption(String),

    /// A value could not be decrypted. Carries no detail on purpose.
    #[error("decryption failed")]
    Decryption,

    /// The persistence layer rejected a statement or transaction.
    #[error("storage error: {0}")]
    Store(String),

    /// No genuine row exists for the requested id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The caller supplied a record that does not match its kind's schema.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The startup integrity self-check observed an unexpected outcome.
    #[error("self-check failed: {0}")]
    SelfCheck(String),
}

impl VaultError {
    /// Returns `true` if the process must not continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VaultError::Config(_) | VaultError::SelfCheck(_))
    }
}
