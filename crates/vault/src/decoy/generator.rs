//! [`DecoyGenerator`]: synthesis, encryption and tagging of decoy batches.

use std::sync::Arc;

use vault_common::record::{Record, CREATED_AT_FIELD, ID_FIELD, TAG_FIELD, UPDATED_AT_FIELD};
use vault_common::{RejectReason, Verdict};

use super::rng::DecoyRng;
use super::synth;
use crate::crypto::{bucket_range, padded_len, CipherError, FieldCipher, DIGEST_LEN};
use crate::integrity::{now_millis, IntegrityTagger};
use crate::kinds::RecordKind;

/// How a decoy's tag is made to fail verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStrategy {
    /// A correctly MACed tag whose sealed flag says `is_real = false`.
    FlaggedFake,
    /// A tag claiming `is_real = true` whose MAC is random bytes.
    ForgedMac,
}

impl TagStrategy {
    fn draw(rng: &mut DecoyRng) -> Self {
        if rng.below(2) == 0 {
            TagStrategy::FlaggedFake
        } else {
            TagStrategy::ForgedMac
        }
    }
}

/// What to imitate: the record kind and the sealed genuine row whose anchor
/// columns and timestamps the decoys copy.
#[derive(Debug, Clone, Copy)]
pub struct DecoyShape<'a> {
    pub kind: RecordKind,
    pub genuine: &'a Record,
}

#[derive(Debug)]
pub struct DecoyGenerator {
    cipher: Arc<FieldCipher>,
    tagger: Arc<IntegrityTagger>,
}

impl DecoyGenerator {
    pub fn new(cipher: Arc<FieldCipher>, tagger: Arc<IntegrityTagger>) -> Self {
        Self { cipher, tagger }
    }

    /// Produce `count` sealed decoys shaped like `shape`.
    ///
    /// Column values are a pure function of `seed`; nonces and tag
    /// timestamps are not.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encryption`] if a column or tag cannot be encrypted.
    pub fn generate(
        &self,
        seed: &[u8],
        count: usize,
        shape: &DecoyShape<'_>,
    ) -> Result<Vec<Record>, CipherError> {
        let mut rng = DecoyRng::from_seed(seed);
        (0..count).map(|_| self.one(&mut rng, shape)).collect()
    }

    fn one(&self, rng: &mut DecoyRng, shape: &DecoyShape<'_>) -> Result<Record, CipherError> {
        let kind = shape.kind;
        let mut record = synth::for_kind(kind)(rng);

        for anchor in kind.anchors() {
            if let Some(value) = shape.genuine.get(anchor) {
                record.insert(*anchor, value.clone());
            }
        }
        record.insert(ID_FIELD, synth::random_uuid(rng));
        let created_at = shape
            .genuine
            .get(CREATED_AT_FIELD)
            .cloned()
            .unwrap_or_else(|| now_millis().into());
        let updated_at = shape
            .genuine
            .get(UPDATED_AT_FIELD)
            .cloned()
            .unwrap_or_else(|| created_at.clone());
        record.insert(CREATED_AT_FIELD, created_at);
        record.insert(UPDATED_AT_FIELD, updated_at);

        let sensitive: Vec<&str> = kind
            .schema()
            .iter()
            .filter(|s| s.sensitive)
            .map(|s| s.name)
            .collect();
        self.seal_columns(&mut record, shape, &sensitive, rng)?;

        let tag = self.tag(&record, TagStrategy::draw(rng), rng)?;
        record.insert(TAG_FIELD, tag);
        Ok(record)
    }

    /// Bring a stored decoy in line with an update to its genuine row.
    ///
    /// Anchor columns in `changed` are copied from the updated genuine row,
    /// every other changed column is redrawn, `updated_at` follows the genuine
    /// row, and the tag is regenerated with the strategy the decoy already
    /// carried.
    pub fn refresh(
        &self,
        seed: &[u8],
        decoy: &Record,
        changed: &[&str],
        shape: &DecoyShape<'_>,
    ) -> Result<Record, CipherError> {
        let kind = shape.kind;
        let mut rng = DecoyRng::from_seed(seed);
        let strategy = match self.tagger.verify_record(decoy) {
            Verdict::Fake(RejectReason::MarkedFake) => TagStrategy::FlaggedFake,
            _ => TagStrategy::ForgedMac,
        };

        let mut record = decoy.clone();
        record.remove(TAG_FIELD);
        let mut redrawn = Vec::new();
        for name in changed {
            let Some(spec) = kind.field(name) else {
                continue;
            };
            if kind.anchors().contains(&spec.name) {
                if let Some(value) = shape.genuine.get(spec.name) {
                    record.insert(spec.name, value.clone());
                }
            } else {
                record.insert(spec.name, synth::value(spec.ty, &mut rng));
                redrawn.push(spec.name);
            }
        }
        self.seal_columns(&mut record, shape, &redrawn, &mut rng)?;
        if let Some(updated_at) = shape.genuine.get(UPDATED_AT_FIELD) {
            record.insert(UPDATED_AT_FIELD, updated_at.clone());
        }

        let tag = self.tag(&record, strategy, &mut rng)?;
        record.insert(TAG_FIELD, tag);
        Ok(record)
    }

    /// Encrypt the sensitive plaintext among `columns`, each fitted to the
    /// padded size of the genuine row's value in that column.
    fn seal_columns(
        &self,
        record: &mut Record,
        shape: &DecoyShape<'_>,
        columns: &[&str],
        rng: &mut DecoyRng,
    ) -> Result<(), CipherError> {
        for name in columns {
            let Some(spec) = shape.kind.field(name).filter(|s| s.sensitive) else {
                continue;
            };
            let Some(plaintext) = record.get_str(spec.name).map(str::to_owned) else {
                continue;
            };
            let plaintext = match self.genuine_len(shape.genuine, spec.name) {
                Some(len) => synth::fit(spec.ty, plaintext, bucket_range(padded_len(len)), rng),
                None => plaintext,
            };
            record.insert(spec.name, self.cipher.seal_str(&plaintext)?);
        }
        Ok(())
    }

    fn genuine_len(&self, genuine: &Record, column: &str) -> Option<usize> {
        genuine
            .get_str(column)
            .and_then(|sealed| self.cipher.open_str(sealed).ok())
            .map(|plaintext| plaintext.len())
    }

    fn tag(
        &self,
        record: &Record,
        strategy: TagStrategy,
        rng: &mut DecoyRng,
    ) -> Result<String, CipherError> {
        match strategy {
            TagStrategy::FlaggedFake => self.tagger.generate(record, false),
            TagStrategy::ForgedMac => {
                let mut forged = [0u8; DIGEST_LEN];
                rng.fill_bytes(&mut forged);
                self.tagger.generate_forged(record, &forged)
            }
        }
    }
}
