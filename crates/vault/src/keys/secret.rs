//! [`SecretKey`] and [`SecretSet`]: immutable holders for key material.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{ConfigError, MIN_MAC_KEY_LEN};
use crate::config::Config;
use crate::crypto::KEY_LEN;

/// Heap buffer holding secret bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which key material lives in RAM.
pub struct SecretKey(Box<[u8]>);

impl SecretKey {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec().into_boxed_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("SecretKey([REDACTED])")
    }
}

/// The application-wide secret set, established once at process start.
///
/// Shared by `Arc` into the cipher, tagger, decoy generator and identity
/// components; read-only thereafter.
#[derive(Debug)]
pub struct SecretSet {
    encryption_key: SecretKey,
    hmac_key: SecretKey,
    integrity_key: SecretKey,
    decoy_seed: SecretKey,
}

impl SecretSet {
    /// Assemble a secret set from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the encryption key is not [`KEY_LEN`]
    /// bytes, either MAC key is shorter than [`MIN_MAC_KEY_LEN`], the decoy
    /// seed is empty, or any two keys are equal.
    pub fn new(
        encryption_key: &[u8],
        hmac_key: &[u8],
        integrity_key: &[u8],
        decoy_seed: &str,
    ) -> Result<Self, ConfigError> {
        if encryption_key.len() != KEY_LEN {
            return Err(ConfigError::WrongLength {
                name: "ENCRYPTION_KEY",
                expected: KEY_LEN,
                actual: encryption_key.len(),
            });
        }
        ensure_min_len(hmac_key, "HMAC_KEY")?;
        ensure_min_len(integrity_key, "INTEGRITY_KEY")?;
        if decoy_seed.trim().is_empty() {
            return Err(ConfigError::Missing("DECOY_SEED"));
        }
        if encryption_key == hmac_key || encryption_key == integrity_key || hmac_key == integrity_key
        {
            return Err(ConfigError::KeysNotDistinct);
        }

        Ok(Self {
            encryption_key: SecretKey::new(encryption_key),
            hmac_key: SecretKey::new(hmac_key),
            integrity_key: SecretKey::new(integrity_key),
            decoy_seed: SecretKey::new(decoy_seed.as_bytes()),
        })
    }

    /// Decode the base64 secrets carried by [`Config`] and validate them.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let encryption_key = decode(&cfg.encryption_key, "ENCRYPTION_KEY")?;
        let hmac_key = decode(&cfg.hmac_key, "HMAC_KEY")?;
        let integrity_key = decode(&cfg.integrity_key, "INTEGRITY_KEY")?;
        Self::new(&encryption_key, &hmac_key, &integrity_key, &cfg.decoy_seed)
    }

    /// 256-bit key for field and tag encryption.
    pub fn encryption_key(&self) -> &[u8] {
        self.encryption_key.as_bytes()
    }

    /// Key for record checksums, lookup hashes and anonymous identities.
    pub fn hmac_key(&self) -> &[u8] {
        self.hmac_key.as_bytes()
    }

    /// Key for the MAC sealed inside every integrity tag.
    pub fn integrity_key(&self) -> &[u8] {
        self.integrity_key.as_bytes()
    }

    /// Seed for the deterministic decoy sequence.
    pub fn decoy_seed(&self) -> &[u8] {
        self.decoy_seed.as_bytes()
    }
}

fn decode(value: &str, name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    STANDARD
        .decode(trimmed)
        .map_err(|_| ConfigError::Malformed(name))
}

fn ensure_min_len(key: &[u8], name: &'static str) -> Result<(), ConfigError> {
    if key.len() < MIN_MAC_KEY_LEN {
        return Err(ConfigError::TooShort {
            name,
            min: MIN_MAC_KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(())
}
