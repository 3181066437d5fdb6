//! Record fingerprints and sealed integrity tags.
//!
//! Every stored row carries one tag in its `metadata_tag` column. The tag is
//! the only thing that separates a genuine row from a decoy, so verification
//! must run on every row leaving the read path.
//!
//! # Module invariants
//!
//! - Verification never returns an error. Broken, foreign or decoy tags all
//!   produce [`vault_common::Verdict::Fake`] with a reason.
//! - A tag is bound to the row values it was generated for; changing a
//!   fingerprinted column without regenerating the tag makes the row fail.

pub mod fingerprint;
pub mod tag;

pub use fingerprint::{canonical_bytes, fingerprint, VOLATILE_FIELDS};
pub use tag::IntegrityTagger;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
