//! # Status Updates
//!
//! Builds and patches the AgeSecret status subresource.
//!
//! Status construction is pure so it can be tested without a cluster. The
//! patch is skipped when nothing but timestamps would change, which keeps the
//! controller from triggering itself through its own watch.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::handler::ApplyOutcome;
use crate::controller::reconciler::types::{
    DecryptionStatus, FailureCounts, Phase, Reconciler, ReconcilerError,
};
use crate::crd::{AgeSecret, AgeSecretStatus, Condition};
use crate::transform::TransformError;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use tracing::debug;

const READY: &str = "Ready";

/// Status after a successful apply
#[must_use]
pub fn success_status(
    previous: Option<&AgeSecretStatus>,
    generation: Option<i64>,
    outcome: &ApplyOutcome,
    now: &str,
) -> AgeSecretStatus {
    let description = match outcome.decryption {
        DecryptionStatus::NotEncrypted => format!(
            "Secret {} written from unencrypted value",
            outcome.destination
        ),
        _ => format!("Secret {} is up to date", outcome.destination),
    };

    AgeSecretStatus {
        phase: Some(Phase::Reconciled.as_str().to_string()),
        conditions: vec![ready_condition(
            previous,
            true,
            "ReconciliationSucceeded",
            &description,
            now,
        )],
        description: Some(description),
        observed_generation: generation,
        last_reconcile_time: Some(now.to_string()),
        destination_secret: Some(outcome.destination.clone()),
        decryption_status: Some(outcome.decryption.as_str().to_string()),
        last_decryption_error: None,
        failed_attempts: Some(0),
    }
}

/// Status after a failed apply
///
/// `counts` includes this failure. The resource is marked `Degraded` once
/// `counts.permanent` reaches `max_permanent_failures`; transient failures
/// never use up that budget.
#[must_use]
pub fn failure_status(
    previous: Option<&AgeSecretStatus>,
    generation: Option<i64>,
    error: &ReconcilerError,
    counts: FailureCounts,
    max_permanent_failures: u32,
    now: &str,
) -> AgeSecretStatus {
    let root = error.root();
    let phase = match root {
        ReconcilerError::IdentityUnavailable { .. } => Phase::WaitingForIdentity,
        _ if !root.is_transient() && counts.permanent >= max_permanent_failures => {
            Phase::Degraded
        }
        _ => Phase::Failed,
    };

    let message = root.to_string();
    let (decryption_status, last_decryption_error) = match root {
        ReconcilerError::Transform(
            TransformError::Decryption(_)
            | TransformError::MalformedEnvelope(_)
            | TransformError::InvalidIdentity(_),
        ) => (
            Some(DecryptionStatus::PermanentFailure.as_str().to_string()),
            Some(message.clone()),
        ),
        _ => (
            previous.and_then(|s| s.decryption_status.clone()),
            previous.and_then(|s| s.last_decryption_error.clone()),
        ),
    };

    let description = match root {
        ReconcilerError::Transform(e) => format!("{message}. {}", e.remediation()),
        _ => message,
    };

    AgeSecretStatus {
        phase: Some(phase.as_str().to_string()),
        conditions: vec![ready_condition(
            previous,
            false,
            phase_reason(phase),
            &description,
            now,
        )],
        description: Some(description),
        observed_generation: generation,
        last_reconcile_time: Some(now.to_string()),
        destination_secret: previous.and_then(|s| s.destination_secret.clone()),
        decryption_status,
        last_decryption_error,
        failed_attempts: Some(counts.attempts),
    }
}

fn phase_reason(phase: Phase) -> &'static str {
    match phase {
        Phase::WaitingForIdentity => "IdentityUnavailable",
        Phase::Degraded => "RetriesExhausted",
        Phase::Reconciled => "ReconciliationSucceeded",
        Phase::Pending | Phase::Failed => "ReconciliationFailed",
    }
}

/// Ready condition, keeping the previous transition time when the value is unchanged
fn ready_condition(
    previous: Option<&AgeSecretStatus>,
    ready: bool,
    reason: &str,
    message: &str,
    now: &str,
) -> Condition {
    let status = if ready { "True" } else { "False" };
    let last_transition_time = previous
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == READY))
        .filter(|c| c.status == status)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| now.to_string());

    Condition {
        r#type: READY.to_string(),
        status: status.to_string(),
        last_transition_time: Some(last_transition_time),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

/// Whether `next` differs from `previous` in anything but `lastReconcileTime`
/// or `failedAttempts`
///
/// A retry that fails the same way again leaves the status untouched, so the
/// status patch does not feed another watch event into the retry loop.
#[must_use]
pub fn status_changed(previous: Option<&AgeSecretStatus>, next: &AgeSecretStatus) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let strip = |status: &AgeSecretStatus| AgeSecretStatus {
        last_reconcile_time: None,
        failed_attempts: None,
        ..status.clone()
    };
    strip(previous) != strip(next)
}

/// Patch the status subresource when it changed
pub async fn update_status(
    reconciler: &Reconciler,
    resource: &AgeSecret,
    status: &AgeSecretStatus,
) -> Result<(), kube::Error> {
    if !status_changed(resource.status.as_ref(), status) {
        debug!("Skipping status update - status unchanged");
        return Ok(());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let api: Api<AgeSecret> = Api::namespaced(reconciler.client.clone(), &namespace);

    let patch = serde_json::json!({
        "status": status
    });

    api.patch_status(
        &resource.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(patch),
    )
    .await?;

    Ok(())
}
