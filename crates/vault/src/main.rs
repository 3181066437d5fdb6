//! `decoy-vault` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Decode the key material into a [`SecretSet`].
//! 4. Run the integrity self-check against the live keys.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use decoy_vault::config::Config;
use decoy_vault::{selfcheck, telemetry, OtelAuditSink, SecretSet};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        decoy_multiplier = cfg.decoy_multiplier,
        "decoy-vault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key material
    // -----------------------------------------------------------------------
    let secrets = match SecretSet::from_config(&cfg) {
        Ok(secrets) => Arc::new(secrets),
        Err(e) => {
            error!(error = %e, "key material rejected");
            telemetry::shutdown_telemetry();
            return Err(e.into());
        }
    };

    // -----------------------------------------------------------------------
    // 4. Self-check
    // -----------------------------------------------------------------------
    let audit = Arc::new(OtelAuditSink::new());
    let outcome = selfcheck::run(secrets, cfg.decoy_multiplier, audit);
    match &outcome {
        Ok(report) => info!(
            kinds = report.kinds,
            decoys_rejected = report.decoys_rejected,
            tampered_rejected = report.tampered_rejected,
            "integrity self-check passed"
        ),
        Err(e) => error!(error = %e, fatal = e.is_fatal(), "integrity self-check failed"),
    }

    telemetry::shutdown_telemetry();
    outcome?;
    Ok(())
}
