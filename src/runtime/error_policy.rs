//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::crd::AgeSecret;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Transient errors are retried on the per-resource Fibonacci schedule for as
/// long as they persist. Permanent errors are retried on the same schedule
/// until `max_permanent_failures` of them have been seen, after which the
/// resource waits for its spec (or its identity secret) to change. Transient
/// failures advance the schedule but not the permanent count.
pub fn handle_reconciliation_error(
    resource: Arc<AgeSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error.reason = error.reason(),
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors(error.reason());

    let transient = error.is_transient();
    let (counts, backoff) = ctx.record_failure(&resource_key(&namespace, &name), transient);
    let max_permanent_failures = ctx.config.max_permanent_failures;

    if !transient && counts.permanent >= max_permanent_failures {
        error!(
            "❌ Reconciliation of {} failed permanently {} times, marked Degraded: {}",
            name, counts.permanent, error
        );
        error!("   Remediation: edit the AgeSecret or its identity secret to trigger a new attempt");
        observability::metrics::increment_requeues("degraded");
        return Action::await_change();
    }

    if transient {
        warn!("Reconciliation of {} failed (transient): {}", name, error);
    } else {
        error!(
            "Reconciliation of {} failed ({}/{}): {}",
            name, counts.permanent, max_permanent_failures, error
        );
    }

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(60));
    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, next retry: {})",
        backoff.as_secs(),
        counts.attempts,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues(if transient {
        "transient_error"
    } else {
        "permanent_error"
    });
    Action::requeue(backoff)
}

/// Watch stream failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 401: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old, the watch relists
    Expired,
    /// 429: API server storage reinitializing or throttling
    Throttled,
    /// 404: CRD missing or object deleted
    NotFound,
    Other,
}

/// Classify a watch stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if (error.contains("401") || error.contains("Unauthorized")) && !is_not_found {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error.contains("429")
        || error.contains("storage is (re)initializing")
        || error.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else if is_not_found {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// `backoff_ms` carries the throttling delay between calls; it doubles on each
/// 429 up to `max_backoff_ms` and is reset by the caller on success.
pub async fn handle_watch_stream_error(
    error: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error
    );

    async move {
        match classify_watch_error(error) {
            WatchErrorKind::Unauthorized => {
                error!("❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
                error!("🔍 Diagnostics:");
                error!("   1. kubectl get clusterrole age-secret-controller");
                error!("   2. kubectl get clusterrolebinding age-secret-controller -o yaml");
                error!("   3. kubectl auth can-i watch agesecrets.pyvo.io --as=system:serviceaccount:<namespace>:age-secret-controller");
                warn!(
                    "⏳ Waiting {}s before retrying watch...",
                    watch_restart_delay.as_secs()
                );
                tokio::time::sleep(watch_restart_delay).await;
            }
            WatchErrorKind::Expired => {
                warn!("Watch resource version expired (410) - this is normal during pod restarts, watch will relist");
            }
            WatchErrorKind::Throttled => {
                let current = backoff_ms.load(Ordering::Relaxed);
                warn!(
                    "API server throttling or reinitializing (429), backing off for {}ms...",
                    current
                );
                tokio::time::sleep(Duration::from_millis(current)).await;
                backoff_ms.store(
                    current.saturating_mul(2).min(max_backoff_ms),
                    Ordering::Relaxed,
                );
            }
            WatchErrorKind::NotFound => {
                warn!(
                    "Resource not found (404) - the AgeSecret CRD may be missing (run crdgen | kubectl apply -f -). Error: {}",
                    error
                );
            }
            WatchErrorKind::Other => {
                error!("Controller stream error: {}", error);
                tokio::time::sleep(watch_restart_delay).await;
            }
        }
    }
    .instrument(error_span)
    .await;
}
