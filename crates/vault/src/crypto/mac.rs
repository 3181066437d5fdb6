//! HMAC-SHA256 tagging with constant-time verification.
//!
//! All digest comparisons in the crate go through this module. Never compare
//! digests with `==`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Byte length of an HMAC-SHA256 digest.
pub const DIGEST_LEN: usize = 32;

/// A raw HMAC-SHA256 output.
pub type Digest = [u8; DIGEST_LEN];

/// Compute `HMAC(key, message)`.
pub fn tag(key: &[u8], message: &[u8]) -> Digest {
    tag_parts(key, &[message])
}

/// Compute `HMAC(key, parts[0] || parts[1] || ...)`.
///
/// Callers that mix variable-length inputs must length-prefix them
/// themselves; see [`len_prefix`].
pub fn tag_parts(key: &[u8], parts: &[&[u8]]) -> Digest {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Verify `digest` against `HMAC(key, message)` in constant time.
pub fn verify(key: &[u8], message: &[u8], digest: &[u8]) -> bool {
    verify_parts(key, &[message], digest)
}

/// Constant-time counterpart of [`tag_parts`].
pub fn verify_parts(key: &[u8], parts: &[&[u8]], digest: &[u8]) -> bool {
    let mut mac = keyed(key);
    for part in parts {
        mac.update(part);
    }
    mac.verify_slice(digest).is_ok()
}

/// Constant-time equality for digests that are not MACs (e.g. fingerprints).
///
/// Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Big-endian u64 length prefix for domain-separating concatenated inputs.
pub fn len_prefix(bytes: &[u8]) -> [u8; 8] {
    (bytes.len() as u64).to_be_bytes()
}

fn keyed(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn tag_verifies() {
        let d = tag(KEY, b"message");
        assert!(verify(KEY, b"message", &d));
    }

    #[test]
    fn altered_message_fails() {
        let d = tag(KEY, b"message");
        assert!(!verify(KEY, b"messagf", &d));
    }

    #[test]
    fn other_key_fails() {
        let d = tag(KEY, b"message");
        assert!(!verify(b"another key entirely", b"message", &d));
    }

    #[test]
    fn truncated_digest_fails() {
        let d = tag(KEY, b"message");
        assert!(!verify(KEY, b"message", &d[..16]));
    }

    #[test]
    fn parts_equal_concatenation() {
        assert_eq!(tag_parts(KEY, &[b"ab", b"cd"]), tag(KEY, b"abcd"));
        assert!(verify_parts(KEY, &[b"a", b"bcd"], &tag(KEY, b"abcd")));
    }

    #[test]
    fn constant_time_eq_semantics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
