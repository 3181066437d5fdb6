//! Field encryption and keyed message authentication.
//!
//! This module is free of storage and record-kind concerns. It provides the
//! primitives the integrity, decoy and identity layers are built from.
//!
//! # Ciphertext format
//!
//! ```text
//! v1.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! ```
//!
//! The `v1` prefix leaves room for a future algorithm change without breaking
//! stored columns.

pub mod cipher;
pub mod mac;

pub use cipher::{
    bucket_range, padded_len, CipherError, EncryptedValue, FieldCipher, KEY_LEN, MIN_PADDED_LEN,
    NONCE_LEN,
};
pub use mac::{Digest, DIGEST_LEN};
