//! Prometheus metrics for reconciliation runs.
//!
//! This module provides metrics for:
//! - Runs (result, duration)
//! - Ledger writes (appends and cell updates)
//! - Workflow outcomes per entry
//! - External calls (sheets, helpdesk, chat)
//!
//! A run is a short-lived process, so there is no scrape endpoint: the
//! exposition can be written to a file for the node-exporter textfile
//! collector.

use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("esfwatch_runs_total", "Total reconciliation runs"),
        &["result"], // "success", "fatal"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("esfwatch_run_duration_seconds", "Duration of a full run")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
    )
    .unwrap()
});

/// Unix time of the last run that finished without a fatal error.
pub static LAST_SUCCESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "esfwatch_last_success_timestamp_seconds",
        "Unix time of the last successful run",
    )
    .unwrap()
});

/// Ledger writes by kind and result.
pub static LEDGER_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("esfwatch_ledger_writes_total", "Total ledger writes"),
        &["kind", "result"], // kind: "append", "status", "updated_at", "ticket_url", "notified"
    )
    .unwrap()
});

/// Workflow outcomes per ledger entry.
pub static WORKFLOW_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "esfwatch_workflow_outcomes_total",
            "Workflow outcomes per ledger entry",
        ),
        &["outcome"], // "completed", "stalled", "failed", "skipped"
    )
    .unwrap()
});

/// External calls by service and result.
pub static EXTERNAL_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("esfwatch_external_calls_total", "Calls to external services"),
        &["service", "result"], // service: "helpdesk", "chat", "sheets"; result: "ok", "error", "timeout"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(RUNS_TOTAL.clone())).unwrap();
    registry.register(Box::new(RUN_DURATION.clone())).unwrap();
    registry.register(Box::new(LAST_SUCCESS.clone())).unwrap();
    registry.register(Box::new(LEDGER_WRITES.clone())).unwrap();
    registry
        .register(Box::new(WORKFLOW_OUTCOMES.clone()))
        .unwrap();
    registry.register(Box::new(EXTERNAL_CALLS.clone())).unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Write the exposition next to `path` and rename it into place, so the
/// collector never reads a half-written file.
pub fn write_textfile(path: &Path) -> io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, encode_metrics())?;
    std::fs::rename(&tmp, path)
}
