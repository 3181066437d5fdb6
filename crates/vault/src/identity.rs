//! Keyed pseudonyms and blind lookup digests.
//!
//! [`AnonymousIdentity::derive`] replaces a real user id in linkage-sensitive
//! tables (supporters, quiz answers, selections). The context is part of the
//! MAC input, so ids for the same user in two contexts cannot be linked
//! without the key.
//!
//! [`AnonymousIdentity::lookup_hash`] gives encrypted columns an equality
//! index: the stored value is a keyed digest of the normalised plaintext.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::crypto::mac;
use crate::keys::SecretSet;

const ANONYMOUS_DOMAIN: &[u8] = b"decoy-vault/anonymous-id/v1";
const LOOKUP_DOMAIN: &[u8] = b"decoy-vault/lookup/v1";

/// Length of a rendered anonymous id or lookup hash (base64url, no padding).
pub const ENCODED_DIGEST_LEN: usize = 43;

#[derive(Debug, Clone)]
pub struct AnonymousIdentity {
    secrets: Arc<SecretSet>,
}

impl AnonymousIdentity {
    pub fn new(secrets: Arc<SecretSet>) -> Self {
        Self { secrets }
    }

    /// Stable pseudonym for `user_id` within `context`.
    pub fn derive(&self, user_id: &str, context: &str) -> String {
        URL_SAFE_NO_PAD.encode(mac::tag(
            self.secrets.hmac_key(),
            &anonymous_message(user_id, context),
        ))
    }

    /// Constant-time check that `id` is the pseudonym of `user_id` in `context`.
    pub fn verify(&self, user_id: &str, context: &str, id: &str) -> bool {
        let Ok(digest) = URL_SAFE_NO_PAD.decode(id) else {
            return false;
        };
        mac::verify(
            self.secrets.hmac_key(),
            &anonymous_message(user_id, context),
            &digest,
        )
    }

    /// Equality-lookup digest for the plaintext `value` of column `field`.
    ///
    /// The value is trimmed and lowercased first, so `" Noa@Example.com"`
    /// and `"noa@example.com"` share a digest.
    pub fn lookup_hash(&self, field: &str, value: &str) -> String {
        let normalised = value.trim().to_lowercase();
        let field_len = mac::len_prefix(field.as_bytes());
        URL_SAFE_NO_PAD.encode(mac::tag_parts(
            self.secrets.hmac_key(),
            &[
                LOOKUP_DOMAIN,
                &field_len[..],
                field.as_bytes(),
                normalised.as_bytes(),
            ],
        ))
    }
}

fn anonymous_message(user_id: &str, context: &str) -> Vec<u8> {
    // Only the context is length-prefixed; the user id runs to the end.
    let mut message =
        Vec::with_capacity(ANONYMOUS_DOMAIN.len() + 8 + context.len() + user_id.len());
    message.extend_from_slice(ANONYMOUS_DOMAIN);
    message.extend_from_slice(&mac::len_prefix(context.as_bytes()));
    message.extend_from_slice(context.as_bytes());
    message.extend_from_slice(user_id.as_bytes());
    message
}
