//! `decoy-vault`: record obfuscation for sensitive tables.
//!
//! Each genuine row is stored with a batch of decoys that look the same at
//! rest. Sensitive columns are encrypted, every row carries an encrypted
//! integrity tag, and the read path keeps only rows whose tag verifies as
//! genuine under the vault's keys.
//!
//! [`service::Vault`] is the entry point for callers.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod decoy;
pub mod identity;
pub mod integrity;
pub mod keys;
pub mod kinds;
pub mod selfcheck;
pub mod service;
pub mod store;
pub mod telemetry;

pub use audit::{AuditSink, OtelAuditSink};
pub use keys::SecretSet;
pub use kinds::RecordKind;
pub use service::{FilteredRows, SealedRecord, Vault};
pub use store::{MemoryStore, RowStore};
pub use vault_common::{FilterReport, Record, RejectReason, VaultError, Verdict};
