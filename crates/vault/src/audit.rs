//! Reporting of read-path filtering to the metrics/audit collaborator.
//!
//! Reports carry aggregate counts and the table name only, never row ids or
//! per-row verdicts.

use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use tracing::debug;
use vault_common::FilterReport;

/// Receives the outcome of every filtering pass.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    fn record_filter(&self, table: &str, report: &FilterReport);
}

/// [`AuditSink`] that feeds OpenTelemetry counters through the global meter.
///
/// Without an installed meter provider the counters are no-ops.
pub struct OtelAuditSink {
    scanned: Counter<u64>,
    discarded: Counter<u64>,
}

impl OtelAuditSink {
    pub fn new() -> Self {
        let meter = global::meter("decoy-vault");
        Self {
            scanned: meter
                .u64_counter("vault.rows.scanned")
                .with_description("Rows passed through integrity filtering")
                .init(),
            discarded: meter
                .u64_counter("vault.rows.discarded")
                .with_description("Rows dropped by integrity filtering")
                .init(),
        }
    }
}

impl Default for OtelAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for OtelAuditSink {
    fn record_filter(&self, table: &str, report: &FilterReport) {
        let attributes = [KeyValue::new("table", table.to_owned())];
        self.scanned.add(report.scanned as u64, &attributes);
        self.discarded.add(report.discarded as u64, &attributes);
        debug!(
            table,
            scanned = report.scanned,
            discarded = report.discarded,
            "integrity filter pass"
        );
    }
}
