//! Outcomes of integrity verification.
//!
//! A failed verification is a normal result on the read path, returned as data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a row was classified as non-genuine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The row carries no `metadata_tag` column.
    MissingTag,
    /// The tag could not be parsed or decrypted under the process key.
    DecryptFailed,
    /// The tag decrypted but its contents are not a well-formed tag.
    MalformedTag,
    /// The tag's MAC does not match its contents.
    MacMismatch,
    /// The row's current fields do not match the fingerprint sealed in the tag.
    FingerprintMismatch,
    /// The keyed checksum over the row does not match the tag.
    ChecksumMismatch,
    /// The tag is intact and says the row is a decoy.
    MarkedFake,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingTag => "missing_tag",
            RejectReason::DecryptFailed => "decrypt_failed",
            RejectReason::MalformedTag => "malformed_tag",
            RejectReason::MacMismatch => "mac_mismatch",
            RejectReason::FingerprintMismatch => "fingerprint_mismatch",
            RejectReason::ChecksumMismatch => "checksum_mismatch",
            RejectReason::MarkedFake => "marked_fake",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of verifying one row against its integrity tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Genuine,
    Fake(RejectReason),
}

impl Verdict {
    pub fn is_genuine(&self) -> bool {
        matches!(self, Verdict::Genuine)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Genuine => None,
            Verdict::Fake(reason) => Some(*reason),
        }
    }
}

/// Aggregate counts from one pass of read-path filtering.
///
/// Deliberately carries no row identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub scanned: usize,
    pub genuine: usize,
    pub discarded: usize,
}

impl FilterReport {
    /// Count one verdict.
    pub fn tally(&mut self, verdict: &Verdict) {
        self.scanned += 1;
        if verdict.is_genuine() {
            self.genuine += 1;
        } else {
            self.discarded += 1;
        }
    }
}
