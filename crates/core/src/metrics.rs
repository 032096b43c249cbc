//! Prometheus metrics for the run engine.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

/// Runs started total.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("dbexport_runs_started_total", "Total runs started").unwrap()
});

/// Runs finished total by terminal status.
pub static RUNS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dbexport_runs_completed_total", "Total runs finished"),
        &["status"], // "success", "no_data", "failed", "cancelled"
    )
    .unwrap()
});

/// Run duration in seconds by terminal status.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("dbexport_run_duration_seconds", "Duration of runs")
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["status"],
    )
    .unwrap()
});

/// Runs currently executing.
pub static RUNS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("dbexport_runs_active", "Runs currently executing").unwrap()
});

/// Variant executions total by outcome.
pub static VARIANTS_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dbexport_variants_executed_total",
            "Total variant executions",
        ),
        &["status"], // "success", "no_data", "failed"
    )
    .unwrap()
});

/// Variant execution duration in seconds.
pub static VARIANT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dbexport_variant_duration_seconds",
            "Duration of variant executions",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &[],
    )
    .unwrap()
});

/// Result lines exported total.
pub static LINES_EXPORTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dbexport_lines_exported_total",
        "Total result lines written to output files",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUNS_COMPLETED.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(RUNS_ACTIVE.clone()),
        Box::new(VARIANTS_EXECUTED.clone()),
        Box::new(VARIANT_DURATION.clone()),
        Box::new(LINES_EXPORTED.clone()),
    ]
}
