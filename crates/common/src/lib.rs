//! Common types, record model, verification outcomes, and errors shared across `decoy-vault` crates.

pub mod error;
pub mod record;
pub mod verdict;

pub use error::VaultError;
pub use record::Record;
pub use verdict::{FilterReport, RejectReason, Verdict};
