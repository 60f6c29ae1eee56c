// Prometheus metrics for shell command execution
//
// - Runs by outcome (counter)
// - Run duration (histogram)
// - Process-tree kills (counter)
// - Confirmation requests and outcomes (counters)
// - Trusted command roots (gauge)

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Run metrics
    pub static ref COMMAND_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("shellgate_command_runs_total", "Total number of command runs by outcome"),
        &["outcome"]
    ).expect("Failed to create command runs metric");

    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("shellgate_command_duration_seconds", "Wall time of spawned commands in seconds")
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["outcome"]
    ).expect("Failed to create command duration metric");

    pub static ref PROCESS_TREE_KILLS_TOTAL: IntCounter = IntCounter::new(
        "shellgate_process_tree_kills_total",
        "Total number of process trees killed on cancellation"
    ).expect("Failed to create process tree kills metric");

    // Confirmation metrics
    pub static ref CONFIRMATION_REQUESTS_TOTAL: IntCounter = IntCounter::new(
        "shellgate_confirmation_requests_total",
        "Total number of confirmation requests raised"
    ).expect("Failed to create confirmation requests metric");

    pub static ref CONFIRMATION_OUTCOMES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("shellgate_confirmation_outcomes_total", "Confirmation outcomes by kind"),
        &["outcome"]
    ).expect("Failed to create confirmation outcomes metric");

    pub static ref TRUSTED_ROOTS: IntGauge = IntGauge::new(
        "shellgate_trusted_roots",
        "Number of command roots in the trust whitelist"
    ).expect("Failed to create trusted roots metric");
}

/// Register all metrics with [`REGISTRY`]
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn init() -> prometheus::Result<()> {
    register(Box::new(COMMAND_RUNS_TOTAL.clone()))?;
    register(Box::new(COMMAND_DURATION_SECONDS.clone()))?;
    register(Box::new(PROCESS_TREE_KILLS_TOTAL.clone()))?;
    register(Box::new(CONFIRMATION_REQUESTS_TOTAL.clone()))?;
    register(Box::new(CONFIRMATION_OUTCOMES_TOTAL.clone()))?;
    register(Box::new(TRUSTED_ROOTS.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> prometheus::Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Record the end of a run
///
/// `duration` is only known for runs that reached the spawn stage.
pub fn record_run(outcome: &str, duration: Option<Duration>) {
    COMMAND_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    if let Some(duration) = duration {
        COMMAND_DURATION_SECONDS
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
