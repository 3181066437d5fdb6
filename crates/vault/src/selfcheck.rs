//! Startup integrity self-check.
//!
//! Runs the full write and read path for every record kind against an
//! in-memory store with the live keys. A failure here means the configured
//! keys or the build cannot separate genuine rows from decoys, and the binary
//! refuses to report healthy.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use vault_common::{Record, VaultError, Verdict};

use crate::audit::AuditSink;
use crate::decoy::{synth, DecoyRng};
use crate::keys::SecretSet;
use crate::kinds::{FieldType, RecordKind};
use crate::service::Vault;
use crate::store::MemoryStore;

const PROBE_SEED: &[u8] = b"decoy-vault/self-check";

/// Counts from a successful self-check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelfCheckReport {
    pub kinds: usize,
    pub genuine_verified: usize,
    pub decoys_rejected: usize,
    pub tampered_rejected: usize,
}

/// Seal, store, filter, tamper and reopen one sample per record kind.
///
/// # Errors
///
/// Returns [`VaultError::SelfCheck`] describing the first property that did
/// not hold, or the underlying error if sealing or storage failed.
pub fn run(
    secrets: Arc<SecretSet>,
    decoy_multiplier: usize,
    audit: Arc<dyn AuditSink>,
) -> Result<SelfCheckReport, VaultError> {
    let vault = Vault::new(secrets, decoy_multiplier, MemoryStore::new(), audit)?;
    let mut rng = DecoyRng::from_seed(PROBE_SEED);
    let mut report = SelfCheckReport::default();

    for kind in RecordKind::ALL {
        let table = kind.table();
        let sample = sample_record(kind, &mut rng);
        let sealed = vault.insert_genuine(kind, sample.clone())?;

        if vault.verify(&sealed.record) != Verdict::Genuine {
            return Err(failure(table, "sealed sample did not verify"));
        }
        report.genuine_verified += 1;

        let raw = vault.store().raw_rows(table);
        if raw.len() != decoy_multiplier + 1 {
            return Err(failure(table, "decoy batch has the wrong size"));
        }
        let filtered = vault.filter_genuine(kind, raw);
        if filtered.rows != [sealed.record.clone()] {
            return Err(failure(table, "filtering did not isolate the sample"));
        }
        report.decoys_rejected += filtered.report.discarded;

        let mut tampered = sealed.record.clone();
        let Some(column) = tamper_target(kind) else {
            return Err(failure(table, "no tamperable column"));
        };
        tampered.insert(column, "tampered");
        if vault.verify(&tampered).is_genuine() {
            return Err(failure(table, "stale tag still verified"));
        }
        report.tampered_rejected += 1;

        let opened = vault.open_record(kind, &sealed.record)?;
        for spec in kind.schema().iter().filter(|s| s.sensitive) {
            if opened.get(spec.name) != sample.get(spec.name) {
                return Err(failure(table, "sensitive column did not round-trip"));
            }
        }

        debug!(table, "self-check passed");
        report.kinds += 1;
    }

    Ok(report)
}

/// Plaintext input for `kind`, shaped like a decoy but without computed columns.
fn sample_record(kind: RecordKind, rng: &mut DecoyRng) -> Record {
    let mut record = synth::for_kind(kind)(rng);
    for (column, _) in kind.lookup_columns() {
        record.remove(column);
    }
    record
}

/// First stored column whose change must invalidate the tag.
fn tamper_target(kind: RecordKind) -> Option<&'static str> {
    kind.schema()
        .iter()
        .find(|spec| !matches!(spec.ty, FieldType::LookupHash { .. }))
        .map(|spec| spec.name)
}

fn failure(table: &str, what: &str) -> VaultError {
    VaultError::SelfCheck(format!("{table}: {what}"))
}
