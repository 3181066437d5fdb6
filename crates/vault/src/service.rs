//! [`Vault`]: the sealed write path and the filtered read path.
//!
//! Every service-layer write of a taggable entity goes through
//! [`Vault::insert_genuine`] (or [`Vault::update_genuine`]), and every read
//! goes through [`Vault::filter_genuine`] or one of the query helpers built on
//! it. A read path that skips filtering leaks which rows are real.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};
use uuid::Uuid;
use vault_common::record::{Record, CREATED_AT_FIELD, ID_FIELD, TAG_FIELD, UPDATED_AT_FIELD};
use vault_common::{FilterReport, RejectReason, VaultError, Verdict};

use crate::audit::AuditSink;
use crate::config::MAX_DECOY_MULTIPLIER;
use crate::crypto::{FieldCipher, DIGEST_LEN};
use crate::decoy::{DecoyGenerator, DecoyShape};
use crate::identity::AnonymousIdentity;
use crate::integrity::{now_millis, IntegrityTagger};
use crate::keys::SecretSet;
use crate::kinds::{FieldType, RecordKind};
use crate::store::RowStore;

/// A genuine row ready for storage, and the tag sealed into it.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedRecord {
    pub record: Record,
    pub tag: String,
}

/// Rows that survived integrity filtering, with the pass's counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredRows {
    pub rows: Vec<Record>,
    pub report: FilterReport,
}

pub struct Vault<S> {
    secrets: Arc<SecretSet>,
    cipher: Arc<FieldCipher>,
    tagger: Arc<IntegrityTagger>,
    decoys: DecoyGenerator,
    identity: AnonymousIdentity,
    decoy_multiplier: usize,
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: RowStore> Vault<S> {
    /// Assemble the vault over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if `decoy_multiplier` is out of range.
    pub fn new(
        secrets: Arc<SecretSet>,
        decoy_multiplier: usize,
        store: S,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, VaultError> {
        if decoy_multiplier == 0 || decoy_multiplier > MAX_DECOY_MULTIPLIER {
            return Err(VaultError::Config(format!(
                "decoy multiplier must be between 1 and {MAX_DECOY_MULTIPLIER}"
            )));
        }
        let cipher = Arc::new(FieldCipher::new(secrets.encryption_key())?);
        let tagger = Arc::new(IntegrityTagger::new(Arc::clone(&secrets), Arc::clone(&cipher)));
        let decoys = DecoyGenerator::new(Arc::clone(&cipher), Arc::clone(&tagger));
        let identity = AnonymousIdentity::new(Arc::clone(&secrets));
        Ok(Self {
            secrets,
            cipher,
            tagger,
            decoys,
            identity,
            decoy_multiplier,
            store,
            audit,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn decoy_multiplier(&self) -> usize {
        self.decoy_multiplier
    }

    /// Pseudonym for `user_id` in `context`.
    pub fn anonymous_id(&self, user_id: &str, context: &str) -> String {
        self.identity.derive(user_id, context)
    }

    pub fn verify_anonymous_id(&self, user_id: &str, context: &str, id: &str) -> bool {
        self.identity.verify(user_id, context, id)
    }

    /// Equality-lookup digest for plaintext `value` of column `field`.
    pub fn lookup_hash(&self, field: &str, value: &str) -> String {
        self.identity.lookup_hash(field, value)
    }

    /// Put the pseudonym of `user_id` into `kind`'s anonymous column.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidRecord`] for kinds without such a column.
    pub fn pseudonymize(
        &self,
        kind: RecordKind,
        record: &mut Record,
        user_id: &str,
    ) -> Result<(), VaultError> {
        let (Some(field), Some(context)) = (kind.anonymous_field(), kind.anonymity_context())
        else {
            return Err(VaultError::InvalidRecord(format!(
                "{} rows carry no anonymous id",
                kind.table()
            )));
        };
        record.insert(field, self.identity.derive(user_id, context));
        Ok(())
    }

    /// Encrypt sensitive columns, compute lookup hashes, stamp id and
    /// timestamps, and attach a genuine integrity tag.
    ///
    /// Does not touch the store.
    pub fn seal_record(
        &self,
        kind: RecordKind,
        plaintext: Record,
    ) -> Result<SealedRecord, VaultError> {
        validate_insert(kind, &plaintext)?;

        let mut record = self.encrypt_columns(kind, &plaintext)?;
        for (column, hash) in self.lookup_hashes(kind, &plaintext) {
            record.insert(column, hash);
        }
        if !record.contains(ID_FIELD) {
            record.insert(ID_FIELD, Uuid::new_v4().to_string());
        }
        let created_at = match record.get(CREATED_AT_FIELD) {
            Some(value) => value.clone(),
            None => {
                let now = serde_json::Value::from(now_millis());
                record.insert(CREATED_AT_FIELD, now.clone());
                now
            }
        };
        if !record.contains(UPDATED_AT_FIELD) {
            record.insert(UPDATED_AT_FIELD, created_at);
        }

        let tag = self.tagger.generate(&record, true)?;
        record.insert(TAG_FIELD, tag.clone());
        Ok(SealedRecord { record, tag })
    }

    /// Seal `plaintext` and persist it together with its decoy batch in one
    /// transaction, in random order.
    pub fn insert_genuine(
        &self,
        kind: RecordKind,
        plaintext: Record,
    ) -> Result<SealedRecord, VaultError> {
        let sealed = self.seal_record(kind, plaintext)?;
        let mut batch = self.decoy_batch(kind, &sealed.record)?;
        batch.push(sealed.record.clone());
        batch.shuffle(&mut OsRng);

        let table = kind.table();
        let mut pending = Some(batch);
        self.store.with_transaction(&mut |tx| {
            for row in pending.take().into_iter().flatten() {
                tx.insert_row(table, row);
            }
            Ok(())
        })?;

        debug!(table, rows = self.decoy_multiplier + 1, "sealed batch stored");
        Ok(sealed)
    }

    /// Verify one row against its own tag.
    pub fn verify(&self, row: &Record) -> Verdict {
        self.tagger.verify_record(row)
    }

    /// Drop every row that does not verify as genuine and report the counts.
    pub fn filter_genuine(&self, kind: RecordKind, rows: Vec<Record>) -> FilteredRows {
        let mut report = FilterReport::default();
        let rows: Vec<Record> = rows
            .into_iter()
            .filter(|row| {
                let verdict = self.tagger.verify_record(row);
                report.tally(&verdict);
                verdict.is_genuine()
            })
            .collect();
        self.audit.record_filter(kind.table(), &report);
        FilteredRows { rows, report }
    }

    /// Query `kind`'s table and filter the result.
    pub fn query_genuine(
        &self,
        kind: RecordKind,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<FilteredRows, VaultError> {
        let rows = self.store.query_rows(kind.table(), predicate)?;
        Ok(self.filter_genuine(kind, rows))
    }

    /// Genuine rows whose lookup hash of `source` equals that of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidRecord`] if `source` has no lookup column.
    pub fn query_by_lookup(
        &self,
        kind: RecordKind,
        source: &str,
        value: &str,
    ) -> Result<FilteredRows, VaultError> {
        let Some((column, _)) = kind.lookup_columns().find(|(_, s)| *s == source) else {
            return Err(VaultError::InvalidRecord(format!(
                "{}.{source} has no lookup column",
                kind.table()
            )));
        };
        let hash = self.identity.lookup_hash(source, value);
        self.query_genuine(kind, &|row| row.get_str(column) == Some(hash.as_str()))
    }

    /// Load the row `id`, which the caller expects to be genuine.
    ///
    /// A row that fails verification the way decoys do is skipped quietly.
    /// Any other failure is logged at `warn`, since it should only happen
    /// after tampering or a write that bypassed the vault.
    pub fn find_genuine(&self, kind: RecordKind, id: &str) -> Result<Record, VaultError> {
        let table = kind.table();
        let rows = self.store.query_rows(table, &|row| row.id() == Some(id))?;
        let mut report = FilterReport::default();
        let mut found = None;
        for row in rows {
            let verdict = self.tagger.verify_record(&row);
            report.tally(&verdict);
            match verdict {
                Verdict::Genuine => found = Some(row),
                Verdict::Fake(reason) if is_decoy_rejection(reason) => {
                    debug!(table, "id resolved to a decoy")
                }
                Verdict::Fake(_) => warn!(table, "row expected to be genuine failed verification"),
            }
        }
        self.audit.record_filter(table, &report);
        found.ok_or_else(|| VaultError::NotFound(format!("{table}/{id}")))
    }

    /// Decrypt the sensitive columns of a stored row. The tag column is dropped.
    pub fn open_record(&self, kind: RecordKind, row: &Record) -> Result<Record, VaultError> {
        let mut opened = Record::new();
        for (name, value) in row.iter() {
            if name == TAG_FIELD {
                continue;
            }
            match kind.field(name) {
                Some(spec) if spec.sensitive => {
                    let column = value.as_str().ok_or(VaultError::Decryption)?;
                    opened.insert(name.clone(), self.cipher.open_str(column)?);
                }
                _ => {
                    opened.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(opened)
    }

    /// Apply `changes` (plaintext) to the genuine row `id` and regenerate its
    /// tag in the same statement.
    ///
    /// The decoys of the row's batch move with it in the same transaction:
    /// changed anchor columns are copied, other changed columns are redrawn,
    /// `updated_at` is shared and their tags are resealed. No stored column
    /// changes on the genuine row alone.
    pub fn update_genuine(
        &self,
        kind: RecordKind,
        id: &str,
        changes: Record,
    ) -> Result<SealedRecord, VaultError> {
        validate_update(kind, &changes)?;
        let current = self.find_genuine(kind, id)?;
        let siblings = self.batch_siblings(kind, &current)?;

        let mut updated = current.clone();
        updated.remove(TAG_FIELD);
        for (name, value) in self.encrypt_columns(kind, &changes)?.iter() {
            updated.insert(name.clone(), value.clone());
        }
        let mut changed: Vec<&str> = changes.iter().map(|(name, _)| name.as_str()).collect();
        for (column, hash) in self.lookup_hashes(kind, &changes) {
            updated.insert(column, hash);
            changed.push(column);
        }
        let now = now_millis();
        updated.insert(UPDATED_AT_FIELD, now);
        let tag = self.tagger.generate(&updated, true)?;
        updated.insert(TAG_FIELD, tag.clone());

        let shape = DecoyShape {
            kind,
            genuine: &updated,
        };
        let mut refreshed = Vec::with_capacity(siblings.len());
        for sibling in &siblings {
            let Some(sibling_id) = sibling.id() else {
                continue;
            };
            let seed = self.decoy_seed(sibling_id, &now.to_be_bytes());
            let row = self.decoys.refresh(&seed, sibling, &changed, &shape)?;
            refreshed.push((sibling_id.to_owned(), row));
        }

        let table = kind.table();
        let decoys = refreshed.len();
        let mut pending = Some((updated.clone(), refreshed));
        self.store.with_transaction(&mut |tx| {
            if let Some((row, batch)) = pending.take() {
                tx.replace_row(table, id, row);
                for (decoy_id, decoy) in batch {
                    tx.replace_row(table, &decoy_id, decoy);
                }
            }
            Ok(())
        })?;

        debug!(table, decoys, "genuine row and batch resealed");
        Ok(SealedRecord {
            record: updated,
            tag,
        })
    }

    /// Stored decoys of the batch `genuine` was inserted with: rows sharing
    /// its anchor values and creation time that do not verify.
    fn batch_siblings(&self, kind: RecordKind, genuine: &Record) -> Result<Vec<Record>, VaultError> {
        let rows = self.store.query_rows(kind.table(), &|row: &Record| {
            row.id() != genuine.id()
                && row.get(CREATED_AT_FIELD) == genuine.get(CREATED_AT_FIELD)
                && kind
                    .anchors()
                    .iter()
                    .all(|anchor| row.get(anchor) == genuine.get(anchor))
        })?;
        Ok(rows
            .into_iter()
            .filter(|row| !self.tagger.verify_record(row).is_genuine())
            .collect())
    }

    fn decoy_batch(&self, kind: RecordKind, genuine: &Record) -> Result<Vec<Record>, VaultError> {
        let seed = self.decoy_seed(genuine.id().unwrap_or_default(), &[]);
        let shape = DecoyShape { kind, genuine };
        Ok(self.decoys.generate(&seed, self.decoy_multiplier, &shape)?)
    }

    /// `DECOY_SEED ‖ 0x1f ‖ id ‖ 0x1f ‖ salt`.
    fn decoy_seed(&self, id: &str, salt: &[u8]) -> Vec<u8> {
        let mut seed = self.secrets.decoy_seed().to_vec();
        seed.push(0x1f);
        seed.extend_from_slice(id.as_bytes());
        seed.push(0x1f);
        seed.extend_from_slice(salt);
        seed
    }

    /// Copy `source`, encrypting its sensitive columns.
    fn encrypt_columns(&self, kind: RecordKind, source: &Record) -> Result<Record, VaultError> {
        let mut out = Record::new();
        for (name, value) in source.iter() {
            match kind.field(name) {
                Some(spec) if spec.sensitive => {
                    let text = value.as_str().ok_or_else(|| {
                        VaultError::InvalidRecord(format!("{name} must be a string"))
                    })?;
                    out.insert(name.clone(), self.cipher.seal_str(text)?);
                }
                _ => {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Lookup hashes for every lookup source present in `plaintext`.
    fn lookup_hashes(&self, kind: RecordKind, plaintext: &Record) -> Vec<(&'static str, String)> {
        kind.lookup_columns()
            .filter_map(|(column, source)| {
                plaintext
                    .get_str(source)
                    .map(|value| (column, self.identity.lookup_hash(source, value)))
            })
            .collect()
    }
}

fn validate_insert(kind: RecordKind, record: &Record) -> Result<(), VaultError> {
    for (name, value) in record.iter() {
        if name == TAG_FIELD {
            return Err(VaultError::InvalidRecord("record is already sealed".into()));
        }
        if [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD].contains(&name.as_str()) {
            continue;
        }
        validate_column(kind, name, value)?;
    }
    for spec in kind.schema() {
        if !matches!(spec.ty, FieldType::LookupHash { .. }) && !record.contains(spec.name) {
            return Err(VaultError::InvalidRecord(format!(
                "missing column {}.{}",
                kind.table(),
                spec.name
            )));
        }
    }
    Ok(())
}

fn validate_update(kind: RecordKind, changes: &Record) -> Result<(), VaultError> {
    if changes.is_empty() {
        return Err(VaultError::InvalidRecord("no changes".into()));
    }
    for (name, value) in changes.iter() {
        validate_column(kind, name, value)?;
    }
    Ok(())
}

fn validate_column(kind: RecordKind, name: &str, value: &serde_json::Value) -> Result<(), VaultError> {
    let Some(spec) = kind.field(name) else {
        return Err(VaultError::InvalidRecord(format!(
            "unknown column {}.{name}",
            kind.table()
        )));
    };
    match spec.ty {
        FieldType::LookupHash { .. } => Err(VaultError::InvalidRecord(format!(
            "{name} is computed and cannot be supplied"
        ))),
        FieldType::AnonymousId if !is_digest(value) => Err(VaultError::InvalidRecord(format!(
            "{name} must hold an anonymous id, not a user id"
        ))),
        _ => Ok(()),
    }
}

fn is_digest(value: &serde_json::Value) -> bool {
    value
        .as_str()
        .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
        .is_some_and(|bytes| bytes.len() == DIGEST_LEN)
}

/// Rejections decoy tags are built to produce.
fn is_decoy_rejection(reason: RejectReason) -> bool {
    matches!(reason, RejectReason::MarkedFake | RejectReason::MacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MockAuditSink;
    use crate::crypto::KEY_LEN;
    use crate::store::MemoryStore;

    fn secrets() -> Arc<SecretSet> {
        Arc::new(SecretSet::new(&[0x11; KEY_LEN], &[0x22; 32], &[0x33; 32], "unit-seed").unwrap())
    }

    fn quiet_audit() -> Arc<dyn AuditSink> {
        let mut sink = MockAuditSink::new();
        sink.expect_record_filter().return_const(());
        Arc::new(sink)
    }

    fn vault() -> Vault<MemoryStore> {
        Vault::new(secrets(), 5, MemoryStore::new(), quiet_audit()).unwrap()
    }

    fn user() -> Record {
        Record::new()
            .with("email", "noa.cohen@example.com")
            .with("full_name", "Noa Cohen")
            .with("identity_number", "000000018")
            .with("phone", "052-1234567")
            .with("date_of_birth", "1988-04-12")
            .with("city", "Haifa")
            .with("address", "12 Herzl St, Haifa")
            .with("role", "voter")
    }

    #[test]
    fn rejects_bad_multiplier() {
        assert!(Vault::new(secrets(), 0, MemoryStore::new(), quiet_audit()).is_err());
        assert!(Vault::new(secrets(), 65, MemoryStore::new(), quiet_audit()).is_err());
    }

    #[test]
    fn seal_encrypts_sensitive_columns_only() {
        let v = vault();
        let sealed = v.seal_record(RecordKind::User, user()).unwrap();
        let r = &sealed.record;
        assert!(r.get_str("email").unwrap().starts_with("v1."));
        assert!(r.get_str("identity_number").unwrap().starts_with("v1."));
        assert_eq!(r.get_str("city"), Some("Haifa"));
        assert_eq!(r.tag(), Some(sealed.tag.as_str()));
        assert!(r.id().is_some());
        assert_eq!(r.get(CREATED_AT_FIELD), r.get(UPDATED_AT_FIELD));
        assert_eq!(
            r.get_str("email_hash"),
            Some(v.lookup_hash("email", "noa.cohen@example.com").as_str())
        );
        assert_eq!(v.verify(r), Verdict::Genuine);
    }

    #[test]
    fn seal_rejects_unknown_missing_and_computed_columns() {
        let v = vault();
        let unknown = user().with("shoe_size", 42);
        assert!(matches!(
            v.seal_record(RecordKind::User, unknown),
            Err(VaultError::InvalidRecord(_))
        ));
        let mut missing = user();
        missing.remove("phone");
        assert!(v.seal_record(RecordKind::User, missing).is_err());
        let computed = user().with("email_hash", "x");
        assert!(v.seal_record(RecordKind::User, computed).is_err());
        let sealed = v.seal_record(RecordKind::User, user()).unwrap();
        assert!(v.seal_record(RecordKind::User, sealed.record).is_err());
    }

    #[test]
    fn seal_rejects_raw_user_id_in_anonymous_column() {
        let v = vault();
        let answer = Record::new()
            .with("respondent_id", "user-42")
            .with("question_id", 3)
            .with("answer", 4)
            .with("weight", 2);
        assert!(matches!(
            v.seal_record(RecordKind::QuizAnswer, answer),
            Err(VaultError::InvalidRecord(_))
        ));
    }

    #[test]
    fn pseudonymize_fills_anonymous_column() {
        let v = vault();
        let mut answer = Record::new()
            .with("question_id", 3)
            .with("answer", 4)
            .with("weight", 2);
        v.pseudonymize(RecordKind::QuizAnswer, &mut answer, "user-42")
            .unwrap();
        let anon = answer.get_str("respondent_id").unwrap().to_owned();
        assert!(v.verify_anonymous_id("user-42", "quiz_answers", &anon));
        assert!(v.seal_record(RecordKind::QuizAnswer, answer).is_ok());

        let mut u = user();
        assert!(v.pseudonymize(RecordKind::User, &mut u, "user-42").is_err());
    }

    #[test]
    fn insert_stores_batch_and_filters_to_one() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        assert_eq!(v.store().count("users"), 6);

        let found = v
            .query_by_lookup(RecordKind::User, "email", "Noa.Cohen@example.com")
            .unwrap();
        assert_eq!(found.rows, vec![sealed.record]);
        assert_eq!(
            found.report,
            FilterReport {
                scanned: 6,
                genuine: 1,
                discarded: 5
            }
        );
    }

    #[test]
    fn filter_reports_to_audit_sink() {
        let mut sink = MockAuditSink::new();
        sink.expect_record_filter()
            .withf(|table, report| {
                table.to_string() == "users" && report.scanned == 6 && report.discarded == 5
            })
            .times(1)
            .return_const(());
        let v = Vault::new(secrets(), 5, MemoryStore::new(), Arc::new(sink)).unwrap();
        v.insert_genuine(RecordKind::User, user()).unwrap();
        let rows = v.store().raw_rows("users");
        let filtered = v.filter_genuine(RecordKind::User, rows);
        assert_eq!(filtered.rows.len(), 1);
    }

    #[test]
    fn open_record_round_trips_plaintext() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let opened = v.open_record(RecordKind::User, &sealed.record).unwrap();
        assert_eq!(opened.get_str("full_name"), Some("Noa Cohen"));
        assert_eq!(opened.get_str("address"), Some("12 Herzl St, Haifa"));
        assert!(opened.tag().is_none());
    }

    #[test]
    fn open_record_fails_closed_on_garbage() {
        let v = vault();
        let mut sealed = v.seal_record(RecordKind::User, user()).unwrap().record;
        sealed.insert("email", "v1.AAAA.BBBB");
        assert!(matches!(
            v.open_record(RecordKind::User, &sealed),
            Err(VaultError::Decryption)
        ));
    }

    #[test]
    fn find_genuine_skips_decoys() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap();
        assert_eq!(v.find_genuine(RecordKind::User, id).unwrap(), sealed.record);

        let decoy = v
            .store()
            .raw_rows("users")
            .into_iter()
            .find(|r| r.id() != Some(id))
            .unwrap();
        assert!(matches!(
            v.find_genuine(RecordKind::User, decoy.id().unwrap()),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn update_reseals_and_stays_visible() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap().to_owned();

        let changes = Record::new().with("city", "Eilat").with("phone", "054-7654321");
        let updated = v.update_genuine(RecordKind::User, &id, changes).unwrap();
        assert_eq!(v.verify(&updated.record), Verdict::Genuine);
        assert_eq!(v.store().count("users"), 6);

        let reloaded = v.find_genuine(RecordKind::User, &id).unwrap();
        let opened = v.open_record(RecordKind::User, &reloaded).unwrap();
        assert_eq!(opened.get_str("city"), Some("Eilat"));
        assert_eq!(opened.get_str("phone"), Some("054-7654321"));
        assert_eq!(opened.get_str("full_name"), Some("Noa Cohen"));
    }

    #[test]
    fn update_of_anchor_moves_whole_batch() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap().to_owned();

        let changes = Record::new().with("email", "noa@new.example.com");
        v.update_genuine(RecordKind::User, &id, changes).unwrap();
        assert_eq!(v.store().count("users"), 6);

        let hash = v.lookup_hash("email", "noa@new.example.com");
        let raw = v
            .store()
            .query_rows("users", &|r| r.get_str("email_hash") == Some(hash.as_str()))
            .unwrap();
        assert_eq!(raw.len(), 6);
        let found = v
            .query_by_lookup(RecordKind::User, "email", "noa@new.example.com")
            .unwrap();
        assert_eq!(found.rows.len(), 1);
        let stale = v
            .query_by_lookup(RecordKind::User, "email", "noa.cohen@example.com")
            .unwrap();
        assert!(stale.rows.is_empty());
    }

    #[test]
    fn manual_edit_without_reseal_hides_row() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap().to_owned();

        let mut edited = sealed.record.clone();
        edited.insert("city", "Eilat");
        v.store()
            .with_transaction(&mut |tx| {
                tx.replace_row("users", &id, edited.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            v.verify(&edited),
            Verdict::Fake(RejectReason::FingerprintMismatch)
        );
        assert!(v.find_genuine(RecordKind::User, &id).is_err());
    }

    #[test]
    fn update_rejects_bad_changes() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap();
        for changes in [
            Record::new(),
            Record::new().with(ID_FIELD, "other"),
            Record::new().with("email_hash", "x"),
            Record::new().with("nickname", "noa"),
        ] {
            assert!(matches!(
                v.update_genuine(RecordKind::User, id, changes),
                Err(VaultError::InvalidRecord(_))
            ));
        }
        assert!(matches!(
            v.update_genuine(RecordKind::User, "no-such-id", Record::new().with("city", "Acre")),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn query_by_lookup_requires_lookup_column() {
        let v = vault();
        assert!(v
            .query_by_lookup(RecordKind::User, "phone", "052-1234567")
            .is_err());
    }

    #[test]
    fn update_moves_every_timestamp_in_the_batch() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap().to_owned();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let updated = v
            .update_genuine(RecordKind::User, &id, Record::new().with("city", "Eilat"))
            .unwrap();
        let rows = v.store().raw_rows("users");
        assert_eq!(rows.len(), 6);
        for row in &rows {
            assert_eq!(row.get(UPDATED_AT_FIELD), updated.record.get(UPDATED_AT_FIELD));
            assert_eq!(row.get(CREATED_AT_FIELD), sealed.record.get(CREATED_AT_FIELD));
        }
        let filtered = v.filter_genuine(RecordKind::User, rows);
        assert_eq!(filtered.rows.len(), 1);
    }

    #[test]
    fn update_reseals_every_changed_ciphertext() {
        let v = vault();
        let sealed = v.insert_genuine(RecordKind::User, user()).unwrap();
        let id = sealed.record.id().unwrap().to_owned();
        let before = v.store().raw_rows("users");

        v.update_genuine(RecordKind::User, &id, Record::new().with("phone", "054-7654321"))
            .unwrap();
        for row in v.store().raw_rows("users") {
            let old = before.iter().find(|r| r.id() == row.id()).unwrap();
            assert_ne!(row.get("phone"), old.get("phone"));
            assert_eq!(row.get("address"), old.get("address"));
            assert_ne!(row.tag(), old.tag());
        }
    }

    #[test]
    fn update_leaves_other_batches_alone() {
        let v = vault();
        let first = v.insert_genuine(RecordKind::User, user()).unwrap();
        let other = user().with("email", "someone.else@example.com");
        v.insert_genuine(RecordKind::User, other).unwrap();
        let untouched: Vec<Record> = v
            .store()
            .raw_rows("users")
            .into_iter()
            .filter(|r| r.get("email_hash") != first.record.get("email_hash"))
            .collect();
        assert_eq!(untouched.len(), 6);

        let id = first.record.id().unwrap();
        v.update_genuine(RecordKind::User, id, Record::new().with("city", "Acre"))
            .unwrap();
        for row in untouched {
            let now = v.store().query_rows("users", &|r| r.id() == row.id()).unwrap();
            assert_eq!(now, vec![row]);
        }
    }

    #[test]
    fn decoy_ciphertexts_match_genuine_length() {
        let v = vault();
        let candidate = Record::new()
            .with("user_id", "2f1c7d0e-8a33-4a52-9d1e-0d6f3b8e4c11")
            .with("display_name", "Noa Cohen")
            .with("email", "noa.cohen@example.com")
            .with("phone", "+972-52-123-4567")
            .with("city", "Haifa")
            .with("age", 38)
            .with("party", "green")
            .with("vision", "Safer streets.")
            .with("plan", "Parks.");
        v.insert_genuine(RecordKind::Candidate, candidate).unwrap();

        let rows = v.store().raw_rows("candidates");
        assert_eq!(rows.len(), 6);
        for spec in RecordKind::Candidate.schema().iter().filter(|s| s.sensitive) {
            let lengths: std::collections::HashSet<usize> = rows
                .iter()
                .map(|r| r.get_str(spec.name).unwrap().len())
                .collect();
            assert_eq!(lengths.len(), 1, "{} lengths differ: {lengths:?}", spec.name);
        }
    }

    #[test]
    fn duplicate_id_insert_is_rejected_whole() {
        let v = vault();
        let first = v.insert_genuine(RecordKind::User, user()).unwrap();
        let reused = user().with(ID_FIELD, first.record.id().unwrap());
        assert!(matches!(
            v.insert_genuine(RecordKind::User, reused),
            Err(VaultError::Store(_))
        ));
        assert_eq!(v.store().count("users"), 6);
    }

    #[test]
    fn only_decoy_style_rejections_count_as_decoys() {
        assert!(is_decoy_rejection(RejectReason::MarkedFake));
        assert!(is_decoy_rejection(RejectReason::MacMismatch));
        for reason in [
            RejectReason::MissingTag,
            RejectReason::DecryptFailed,
            RejectReason::MalformedTag,
            RejectReason::FingerprintMismatch,
            RejectReason::ChecksumMismatch,
        ] {
            assert!(!is_decoy_rejection(reason), "{reason}");
        }
    }

    #[test]
    fn genuine_row_position_varies_across_batches() {
        let v = vault();
        let mut positions = std::collections::HashSet::new();
        for i in 0..30 {
            let sealed = v
                .insert_genuine(RecordKind::User, user().with("email", format!("u{i}@example.com")))
                .unwrap();
            let rows = v.store().raw_rows("users");
            let batch = &rows[rows.len() - 6..];
            let at = batch.iter().position(|r| r.id() == sealed.record.id()).unwrap();
            positions.insert(at);
        }
        assert!(positions.len() > 1);
    }
}
