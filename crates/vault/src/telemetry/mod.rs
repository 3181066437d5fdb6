//! Tracing subscriber and optional OpenTelemetry export.
//!
//! # Telemetry invariants
//!
//! - **No key material, plaintext column values, or per-row verdicts** may
//!   appear in any span attribute, metric label, or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
