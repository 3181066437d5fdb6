//! Configuration loading and validation for the vault.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.
//! Secrets are decoded and length-checked separately by
//! [`crate::keys::SecretSet::from_config`].

use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Upper bound on decoys per genuine row.
pub const MAX_DECOY_MULTIPLIER: usize = 64;

/// Validated vault configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Base64 256-bit key for field and tag encryption. **Required.**
    pub encryption_key: String,

    /// Base64 key for checksums, lookup hashes and anonymous ids. **Required.**
    pub hmac_key: String,

    /// Base64 key for the MAC inside integrity tags. **Required.**
    pub integrity_key: String,

    /// Seed string for the deterministic decoy sequence. **Required.**
    pub decoy_seed: String,

    /// Number of decoy rows stored alongside every genuine row.
    #[serde(default = "default_decoy_multiplier")]
    pub decoy_multiplier: usize,

    /// OTLP endpoint for traces and metrics. Local JSON logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_decoy_multiplier() -> usize {
    5
}
fn default_log_level() -> String {
    "info".into()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &"[REDACTED]")
            .field("hmac_key", &"[REDACTED]")
            .field("integrity_key", &"[REDACTED]")
            .field("decoy_seed", &"[REDACTED]")
            .field("decoy_multiplier", &self.decoy_multiplier)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.encryption_key, "ENCRYPTION_KEY")?;
        ensure_non_empty(&self.hmac_key, "HMAC_KEY")?;
        ensure_non_empty(&self.integrity_key, "INTEGRITY_KEY")?;
        ensure_non_empty(&self.decoy_seed, "DECOY_SEED")?;

        if self.decoy_multiplier == 0 || self.decoy_multiplier > MAX_DECOY_MULTIPLIER {
            anyhow::bail!("DECOY_MULTIPLIER must be between 1 and {MAX_DECOY_MULTIPLIER}");
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            encryption_key: "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=".into(),
            hmac_key: "AgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgI=".into(),
            integrity_key: "AwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwMDAwM=".into(),
            decoy_seed: "correct horse".into(),
            decoy_multiplier: default_decoy_multiplier(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_decoy_multiplier(), 5);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_key() {
        let cfg = Config {
            integrity_key: " ".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_seed() {
        let cfg = Config {
            decoy_seed: "".into(),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_multiplier_out_of_range() {
        for multiplier in [0, MAX_DECOY_MULTIPLIER + 1] {
            let cfg = Config {
                decoy_multiplier: multiplier,
                ..valid()
            };
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn validate_rejects_blank_endpoint() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some(String::new()),
            ..valid()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let printed = format!("{:?}", valid());
        assert!(!printed.contains("AQEBAQ"));
        assert!(!printed.contains("correct horse"));
    }
}
