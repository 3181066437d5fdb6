//! Deterministic digest of a record's semantic columns.

use serde_json::Value;
use sha2::{Digest as _, Sha256};
use vault_common::record::{Record, CREATED_AT_FIELD, ID_FIELD, TAG_FIELD, UPDATED_AT_FIELD};

use crate::crypto::{Digest, DIGEST_LEN};

/// Identity and volatile columns left out of the fingerprint.
pub const VOLATILE_FIELDS: [&str; 4] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD, TAG_FIELD];

const DOMAIN: &[u8] = b"decoy-vault/fingerprint/v1\n";

/// SHA-256 over the canonical form of `record` minus [`VOLATILE_FIELDS`].
pub fn fingerprint(record: &Record) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    hasher.update(canonical_bytes(record, &VOLATILE_FIELDS));
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Canonical JSON of `record` with `excluded` columns removed.
///
/// Object keys are emitted in sorted order at every depth, without
/// whitespace, so the output depends only on the logical content.
pub fn canonical_bytes(record: &Record, excluded: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.push(b'{');
    let mut first = true;
    for (key, value) in record.iter() {
        if excluded.contains(&key.as_str()) {
            continue;
        }
        if !first {
            out.push(b',');
        }
        first = false;
        write_key(key, &mut out);
        out.push(b':');
        write_value(value, &mut out);
    }
    out.push(b'}');
    out
}

fn write_key(key: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(Value::from(key).to_string().as_bytes());
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_key(key, out);
                out.push(b':');
                write_value(&map[key], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        scalar => out.extend_from_slice(scalar.to_string().as_bytes()),
    }
}
