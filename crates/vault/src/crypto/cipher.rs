//! AES-256-GCM-SIV encryption and decryption of individual text values.
//!
//! Every call draws a fresh 96-bit nonce from the OS CSPRNG, so two
//! encryptions of the same plaintext never produce the same column value.
//! GCM-SIV keeps a collision of random nonces from becoming catastrophic.
//!
//! Text columns are padded before sealing to a power-of-two size of at least
//! [`MIN_PADDED_LEN`] bytes, so a stored column reveals only the size bucket
//! of its plaintext.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;
use vault_common::VaultError;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Smallest padded size of a sealed text column.
pub const MIN_PADDED_LEN: usize = 32;

const PAD_MARKER: u8 = 0x80;

/// Size that `len` plaintext bytes occupy once padded for sealing.
pub fn padded_len(len: usize) -> usize {
    (len + 1).next_power_of_two().max(MIN_PADDED_LEN)
}

/// Plaintext byte lengths that pad to exactly `padded` bytes.
pub fn bucket_range(padded: usize) -> RangeInclusive<usize> {
    let low = if padded <= MIN_PADDED_LEN { 0 } else { padded / 2 };
    low..=padded.saturating_sub(1)
}

/// Prefix that appears at the start of every encrypted value.
pub const VERSION_PREFIX: &str = "v1";

/// A parsed, encrypted value.
///
/// The string representation is `v1.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }
}

impl FromStr for EncryptedValue {
    type Err = CipherError;

    /// Parse the `v1.<nonce>.<ciphertext>` form.
    ///
    /// Any structural problem, including a nonce of the wrong length, is
    /// reported as [`CipherError::Decryption`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, '.').collect();
        if parts.len() != 3 || parts[0] != VERSION_PREFIX {
            return Err(CipherError::Decryption);
        }
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CipherError::Decryption)?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CipherError::Decryption)?;

        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::Decryption)?;

        Ok(Self { nonce, ciphertext })
    }
}

/// Errors produced by the cipher layer.
///
/// Decryption failures are a single variant with a fixed message so callers
/// cannot tell a bad nonce from a bad key from tampered bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed")]
    Decryption,
}

impl From<CipherError> for VaultError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKeyLength => VaultError::Config(e.to_string()),
            CipherError::Encryption => VaultError::Encryption(e.to_string()),
            CipherError::Decryption => VaultError::Decryption,
        }
    }
}

/// Symmetric encryptor for single text values, bound to one key.
pub struct FieldCipher {
    cipher: Aes256GcmSiv,
}

impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCipher([REDACTED])")
    }
}

impl FieldCipher {
    /// Build a cipher from a raw key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength);
        }
        let cipher =
            Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
        Ok(Self { cipher })
    }

    /// Encrypt a text value under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue, CipherError> {
        self.encrypt_bytes(plaintext.as_bytes())
    }

    /// Encrypt raw bytes under a fresh random nonce.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<EncryptedValue, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::Encryption)?;

        Ok(EncryptedValue {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Decrypt an [`EncryptedValue`] back to text.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decryption`] on a wrong key, tampered bytes, or
    /// plaintext that is not UTF-8.
    pub fn decrypt(&self, value: &EncryptedValue) -> Result<String, CipherError> {
        let bytes = self.decrypt_bytes(value)?;
        String::from_utf8(bytes).map_err(|_| CipherError::Decryption)
    }

    /// Decrypt an [`EncryptedValue`] back to raw bytes.
    pub fn decrypt_bytes(&self, value: &EncryptedValue) -> Result<Vec<u8>, CipherError> {
        let nonce = Nonce::from_slice(&value.nonce);
        self.cipher
            .decrypt(nonce, value.ciphertext.as_ref())
            .map_err(|_| CipherError::Decryption)
    }

    /// Pad, encrypt and render to the column string form.
    pub fn seal_str(&self, plaintext: &str) -> Result<String, CipherError> {
        let size = padded_len(plaintext.len());
        let mut padded = Vec::with_capacity(size);
        padded.extend_from_slice(plaintext.as_bytes());
        padded.push(PAD_MARKER);
        padded.resize(size, 0);
        Ok(self.encrypt_bytes(&padded)?.to_string())
    }

    /// Parse a column string, decrypt it and strip the padding.
    pub fn open_str(&self, column: &str) -> Result<String, CipherError> {
        let value: EncryptedValue = column.parse()?;
        let mut bytes = self.decrypt_bytes(&value)?;
        let marker = bytes
            .iter()
            .rposition(|&b| b != 0)
            .ok_or(CipherError::Decryption)?;
        if bytes[marker] != PAD_MARKER {
            return Err(CipherError::Decryption);
        }
        bytes.truncate(marker);
        String::from_utf8(bytes).map_err(|_| CipherError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn cipher() -> FieldCipher {
        FieldCipher::new(&random_key()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let c = cipher();
        let encrypted = c.encrypt("123456782").unwrap();
        assert_eq!(c.decrypt(&encrypted).unwrap(), "123456782");
    }

    #[test]
    fn round_trip_empty_and_multibyte() {
        let c = cipher();
        for text in ["", "שלום עולם", "naïve café", "🗳️ vote", "日本語テキスト"] {
            let column = c.seal_str(text).unwrap();
            assert_eq!(c.open_str(&column).unwrap(), text);
        }
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let c1 = cipher();
        let c2 = cipher();
        let encrypted = c1.encrypt("secret").unwrap();
        assert_eq!(c2.decrypt(&encrypted), Err(CipherError::Decryption));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert_eq!(
            FieldCipher::new(&[0u8; 16]).unwrap_err(),
            CipherError::InvalidKeyLength
        );
    }

    #[test]
    fn nonces_never_repeat() {
        let c = cipher();
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let column = c.seal_str("same plaintext").unwrap();
            assert!(seen.insert(column), "identical ciphertext produced twice");
        }
    }

    #[test]
    fn string_repr_round_trip() {
        let c = cipher();
        let field = c.encrypt("hello").unwrap();
        let s = field.to_string();
        assert!(s.starts_with("v1."));
        let parsed: EncryptedValue = s.parse().unwrap();
        assert_eq!(parsed, field);
    }

    #[test]
    fn parse_rejects_bad_prefix() {
        assert!("v2.abc.def".parse::<EncryptedValue>().is_err());
    }

    #[test]
    fn parse_rejects_too_few_parts() {
        assert!("v1.abc".parse::<EncryptedValue>().is_err());
    }

    #[test]
    fn parse_rejects_bad_base64() {
        assert!("v1.!!!.abc".parse::<EncryptedValue>().is_err());
    }

    #[test]
    fn parse_rejects_short_nonce() {
        let short = URL_SAFE_NO_PAD.encode([0u8; 8]);
        let s = format!("v1.{short}.AAAA");
        assert_eq!(s.parse::<EncryptedValue>(), Err(CipherError::Decryption));
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let c = cipher();
        let mut field = c.encrypt("tamper me").unwrap();
        field.ciphertext[0] ^= 0xFF;
        assert!(c.decrypt(&field).is_err());
    }

    #[test]
    fn all_decryption_failures_look_alike() {
        let c = cipher();
        let wrong_key = cipher().seal_str("x").unwrap();
        let bad_format = c.open_str("garbage").unwrap_err();
        let bad_key = c.open_str(&wrong_key).unwrap_err();
        assert_eq!(bad_format.to_string(), bad_key.to_string());
    }

    #[test]
    fn sealed_length_depends_only_on_bucket() {
        let c = cipher();
        let short = c.seal_str("Safer streets.").unwrap();
        let longer = c.seal_str("Open budgets for every street!!").unwrap();
        let multibyte = c.seal_str("נועה כהן").unwrap();
        assert_eq!(short.len(), longer.len());
        assert_eq!(short.len(), multibyte.len());

        let next_bucket = c.seal_str(&"x".repeat(32)).unwrap();
        assert!(next_bucket.len() > short.len());
    }

    #[test]
    fn padding_buckets() {
        assert_eq!(padded_len(0), 32);
        assert_eq!(padded_len(31), 32);
        assert_eq!(padded_len(32), 64);
        assert_eq!(padded_len(280), 512);
        assert_eq!(bucket_range(32), 0..=31);
        assert_eq!(bucket_range(512), 256..=511);
        for len in [0, 5, 31, 32, 100, 511, 512, 3000] {
            assert!(bucket_range(padded_len(len)).contains(&len), "{len}");
        }
    }

    #[test]
    fn unpadded_plaintext_is_rejected() {
        let c = cipher();
        let raw = c.encrypt("no marker").unwrap().to_string();
        assert_eq!(c.open_str(&raw), Err(CipherError::Decryption));
    }
}
