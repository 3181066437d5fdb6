//! [`IntegrityTagger`]: generation and verification of sealed integrity tags.
//!
//! A tag is the JSON object
//!
//! ```text
//! { fingerprint, is_real, timestamp, checksum, mac }
//! ```
//!
//! where `mac = HMAC(integrity_key, json{fingerprint, is_real, timestamp, checksum})`
//! and `checksum = HMAC(hmac_key, canonical(row minus tag and updated_at))`.
//! The object is then encrypted with the field cipher and stored as a
//! `v1.<nonce>.<ciphertext>` string.
//!
//! Every component of the plaintext has a fixed width (`is_real` is encoded as
//! `0`/`1`, digests as unpadded base64url, timestamps as unix milliseconds),
//! so genuine and decoy tags encrypt to the same length.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use vault_common::record::{Record, TAG_FIELD, UPDATED_AT_FIELD};
use vault_common::{RejectReason, Verdict};

use super::fingerprint::{canonical_bytes, fingerprint};
use super::now_millis;
use crate::crypto::{mac, CipherError, Digest, EncryptedValue, FieldCipher};
use crate::keys::SecretSet;

/// Columns excluded from the keyed checksum. The row id and creation time stay
/// in, which binds a tag to the row it was issued for.
const CHECKSUM_EXCLUDED: [&str; 2] = [TAG_FIELD, UPDATED_AT_FIELD];

/// The MAC-covered part of a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct TagBody<'a> {
    fingerprint: &'a str,
    #[serde(with = "flag")]
    is_real: bool,
    timestamp: i64,
    checksum: &'a str,
}

/// The full tag as it exists before encryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedTag {
    fingerprint: String,
    #[serde(with = "flag")]
    is_real: bool,
    timestamp: i64,
    checksum: String,
    mac: String,
}

impl SealedTag {
    fn body(&self) -> TagBody<'_> {
        TagBody {
            fingerprint: &self.fingerprint,
            is_real: self.is_real,
            timestamp: self.timestamp,
            checksum: &self.checksum,
        }
    }
}

/// Serialises `bool` as the single digit `0` or `1`.
mod flag {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match u8::deserialize(d)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(D::Error::custom(format!("invalid flag value {other}"))),
        }
    }
}

/// Issues and checks integrity tags under the process secret set.
#[derive(Debug)]
pub struct IntegrityTagger {
    secrets: Arc<SecretSet>,
    cipher: Arc<FieldCipher>,
}

impl IntegrityTagger {
    /// `cipher` must be keyed with `secrets.encryption_key()`.
    pub fn new(secrets: Arc<SecretSet>, cipher: Arc<FieldCipher>) -> Self {
        Self { secrets, cipher }
    }

    /// Produce an opaque tag for `record` carrying the given `is_real` flag.
    ///
    /// `record` must already hold its final column values; the tag column
    /// itself is ignored if present.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encryption`] if the tag cannot be encrypted.
    pub fn generate(&self, record: &Record, is_real: bool) -> Result<String, CipherError> {
        let fp = encode(&fingerprint(record));
        let checksum = encode(&self.checksum(record));
        let body = TagBody {
            fingerprint: &fp,
            is_real,
            timestamp: now_millis(),
            checksum: &checksum,
        };
        let mac = mac::tag(self.secrets.integrity_key(), &body_bytes(&body)?);
        self.seal(&body, &mac)
    }

    /// Produce a tag claiming `is_real = true` whose MAC is `forged` instead
    /// of the real MAC. Structurally identical to a genuine tag; it can never
    /// verify.
    pub(crate) fn generate_forged(
        &self,
        record: &Record,
        forged: &Digest,
    ) -> Result<String, CipherError> {
        let fp = encode(&fingerprint(record));
        let checksum = encode(&self.checksum(record));
        let body = TagBody {
            fingerprint: &fp,
            is_real: true,
            timestamp: now_millis(),
            checksum: &checksum,
        };
        self.seal(&body, forged)
    }

    /// Verify `tag` against the row it was loaded with.
    ///
    /// Checks, in order: decryption, MAC over the tag body, fingerprint of the
    /// current row, keyed checksum of the current row. Only when all pass is
    /// the sealed `is_real` flag consulted.
    pub fn verify(&self, tag: &str, record: &Record) -> Verdict {
        let Ok(encrypted) = tag.parse::<EncryptedValue>() else {
            return Verdict::Fake(RejectReason::DecryptFailed);
        };
        let Ok(plaintext) = self.cipher.decrypt_bytes(&encrypted) else {
            return Verdict::Fake(RejectReason::DecryptFailed);
        };
        let Ok(sealed) = serde_json::from_slice::<SealedTag>(&plaintext) else {
            return Verdict::Fake(RejectReason::MalformedTag);
        };

        let (Ok(stored_mac), Ok(stored_fingerprint), Ok(stored_checksum)) = (
            decode(&sealed.mac),
            decode(&sealed.fingerprint),
            decode(&sealed.checksum),
        ) else {
            return Verdict::Fake(RejectReason::MalformedTag);
        };
        let Ok(body) = body_bytes(&sealed.body()) else {
            return Verdict::Fake(RejectReason::MalformedTag);
        };

        if !mac::verify(self.secrets.integrity_key(), &body, &stored_mac) {
            return Verdict::Fake(RejectReason::MacMismatch);
        }
        if !mac::constant_time_eq(&stored_fingerprint, &fingerprint(record)) {
            return Verdict::Fake(RejectReason::FingerprintMismatch);
        }
        let checksum_input = canonical_bytes(record, &CHECKSUM_EXCLUDED);
        if !mac::verify(self.secrets.hmac_key(), &checksum_input, &stored_checksum) {
            return Verdict::Fake(RejectReason::ChecksumMismatch);
        }

        if sealed.is_real {
            Verdict::Genuine
        } else {
            Verdict::Fake(RejectReason::MarkedFake)
        }
    }

    /// Verify a row against the tag stored in its own `metadata_tag` column.
    pub fn verify_record(&self, record: &Record) -> Verdict {
        match record.tag() {
            Some(tag) => self.verify(tag, record),
            None => Verdict::Fake(RejectReason::MissingTag),
        }
    }

    fn checksum(&self, record: &Record) -> Digest {
        mac::tag(
            self.secrets.hmac_key(),
            &canonical_bytes(record, &CHECKSUM_EXCLUDED),
        )
    }

    fn seal(&self, body: &TagBody<'_>, mac: &Digest) -> Result<String, CipherError> {
        let sealed = SealedTag {
            fingerprint: body.fingerprint.to_owned(),
            is_real: body.is_real,
            timestamp: body.timestamp,
            checksum: body.checksum.to_owned(),
            mac: encode(mac),
        };
        let json = serde_json::to_vec(&sealed).map_err(|_| CipherError::Encryption)?;
        Ok(self.cipher.encrypt_bytes(&json)?.to_string())
    }
}

fn body_bytes(body: &TagBody<'_>) -> Result<Vec<u8>, CipherError> {
    serde_json::to_vec(body).map_err(|_| CipherError::Encryption)
}

fn encode(digest: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(digest)
}

fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s)
}
