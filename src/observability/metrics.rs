//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `age_secret_reconciliations_total` - Total number of reconciliations
//! - `age_secret_reconciliation_errors_total{reason}` - Reconciliation errors by reason
//! - `age_secret_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `age_secret_decryptions_total` - Successful decryptions of `spec.secret`
//! - `age_secret_decryption_errors_total{reason}` - Decryption failures by reason
//! - `age_secret_native_secrets_written_total` - Native secrets created or overwritten
//! - `age_secret_native_secrets_deleted_total` - Native secrets deleted
//! - `age_secret_requeues_total{reason}` - Requeues scheduled by the error policy
//! - `age_secret_store_retries_total{operation}` - In-call retries of native secret API calls

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "age_secret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "age_secret_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "age_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static DECRYPTIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "age_secret_decryptions_total",
        "Total number of successful age decryptions",
    )
    .expect("Failed to create DECRYPTIONS_TOTAL metric - this should never happen")
});

static DECRYPTION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "age_secret_decryption_errors_total",
            "Total number of age decryption failures by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create DECRYPTION_ERRORS_TOTAL metric - this should never happen")
});

static NATIVE_SECRETS_WRITTEN_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "age_secret_native_secrets_written_total",
        "Total number of native secrets created or overwritten",
    )
    .expect("Failed to create NATIVE_SECRETS_WRITTEN_TOTAL metric - this should never happen")
});

static NATIVE_SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "age_secret_native_secrets_deleted_total",
        "Total number of native secrets deleted",
    )
    .expect("Failed to create NATIVE_SECRETS_DELETED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "age_secret_requeues_total",
            "Total number of requeues scheduled by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static STORE_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "age_secret_store_retries_total",
            "Total number of retried native secret API calls by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create STORE_RETRIES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(DECRYPTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DECRYPTION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NATIVE_SECRETS_WRITTEN_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NATIVE_SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_RETRIES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_decryptions() {
    DECRYPTIONS_TOTAL.inc();
}

pub fn increment_decryption_errors(reason: &str) {
    DECRYPTION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_native_secrets_written() {
    NATIVE_SECRETS_WRITTEN_TOTAL.inc();
}

pub fn increment_native_secrets_deleted() {
    NATIVE_SECRETS_DELETED_TOTAL.inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_store_retries(operation: &str) {
    STORE_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// Encode every registered metric in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when the encoder rejects a metric family"
)]
pub fn gather_text() -> Result<String> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
