//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::handler::AgeSecretHandler;
use crate::controller::reconciler::retry::RetryPolicy;
use crate::controller::reconciler::store::{KubeSecretStore, StoreError};
use crate::crd::AgeSecret;
use crate::transform::TransformError;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Decrypting `spec.secret` failed; retrying cannot help
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The identity secret or its data key is missing
    #[error("identity secret {namespace}/{secret} unavailable: {reason}")]
    IdentityUnavailable {
        namespace: String,
        secret: String,
        reason: String,
    },

    /// The native secret API failed after in-call retries
    #[error("native secret store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The AgeSecret object itself is unusable (no name or namespace)
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ReconcilerError>>),
}

impl ReconcilerError {
    /// The underlying error, unwrapping finalizer apply/cleanup failures
    #[must_use]
    pub fn root(&self) -> &ReconcilerError {
        use kube_runtime::finalizer::Error as FinalizerError;
        match self {
            ReconcilerError::Finalizer(inner) => match inner.as_ref() {
                FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e.root(),
                _ => self,
            },
            other => other,
        }
    }

    /// Whether a later attempt may succeed without the resource changing
    #[must_use]
    pub fn is_transient(&self) -> bool {
        use kube_runtime::finalizer::Error as FinalizerError;
        match self {
            ReconcilerError::Transform(_) | ReconcilerError::InvalidResource(_) => false,
            ReconcilerError::IdentityUnavailable { .. } | ReconcilerError::StoreUnavailable(_) => {
                true
            }
            ReconcilerError::Finalizer(inner) => match inner.as_ref() {
                FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => {
                    e.is_transient()
                }
                FinalizerError::AddFinalizer(_) | FinalizerError::RemoveFinalizer(_) => true,
                _ => false,
            },
        }
    }

    /// Stable label for metrics and status conditions
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self.root() {
            ReconcilerError::Transform(e) => e.reason(),
            ReconcilerError::IdentityUnavailable { .. } => "identity_unavailable",
            ReconcilerError::StoreUnavailable(_) => "store_unavailable",
            ReconcilerError::InvalidResource(_) => "invalid_resource",
            ReconcilerError::Finalizer(_) => "finalizer",
        }
    }
}

/// Convergence state of an AgeSecret and its derived native secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// No AgeSecret (deleted, or cleanup finished)
    Absent,
    /// AgeSecret exists but its native secret is not (yet) in sync
    ResourcePresentSecretAbsent,
    /// Native secret matches the current generation
    Reconciled,
}

impl ReconcileState {
    /// Derive the state from what the resource and its status report
    #[must_use]
    pub fn observe(resource: Option<&AgeSecret>) -> Self {
        let Some(resource) = resource else {
            return ReconcileState::Absent;
        };
        if resource.metadata.deletion_timestamp.is_some() {
            return ReconcileState::Absent;
        }

        let in_sync = resource.status.as_ref().is_some_and(|status| {
            status.phase.as_deref() == Some(Phase::Reconciled.as_str())
                && status.destination_secret.as_deref() == Some(resource.spec.secret_name.as_str())
                && status.observed_generation == resource.metadata.generation
        });

        if in_sync {
            ReconcileState::Reconciled
        } else {
            ReconcileState::ResourcePresentSecretAbsent
        }
    }
}

/// Status phase values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Reconciled,
    Failed,
    Degraded,
    WaitingForIdentity,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "Pending",
            Phase::Reconciled => "Reconciled",
            Phase::Failed => "Failed",
            Phase::Degraded => "Degraded",
            Phase::WaitingForIdentity => "WaitingForIdentity",
        }
    }
}

/// Outcome of decrypting `spec.secret` during apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionStatus {
    Success,
    PermanentFailure,
    /// `spec.secret` carried no envelope and was written as-is
    NotEncrypted,
}

impl DecryptionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DecryptionStatus::Success => "Success",
            DecryptionStatus::PermanentFailure => "PermanentFailure",
            DecryptionStatus::NotEncrypted => "NotEncrypted",
        }
    }
}

/// Consecutive failures of one resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounts {
    /// All failures, transient or not
    pub attempts: u32,
    /// Failures that only a spec change can fix
    pub permanent: u32,
}

impl FailureCounts {
    /// Counts once one more failure is recorded
    #[must_use]
    pub fn after(self, transient: bool) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            permanent: if transient {
                self.permanent
            } else {
                self.permanent.saturating_add(1)
            },
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error counts and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    /// Non-transient failures; only these count towards `MAX_PERMANENT_FAILURES`
    pub permanent_count: u32,
    /// Generation the errors were counted against
    pub generation: Option<i64>,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            backoff: FibonacciBackoff::new(1, 10), // 1 minute min, 10 minutes max
            error_count: 0,
            permanent_count: 0,
            generation: None,
        }
    }
}

impl BackoffState {
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.permanent_count = 0;
        self.backoff.reset();
    }

    #[must_use]
    pub fn counts(&self) -> FailureCounts {
        FailureCounts {
            attempts: self.error_count,
            permanent: self.permanent_count,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub handler: Arc<AgeSecretHandler<KubeSecretStore>>,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let store = KubeSecretStore::new(client.clone());
        let handler = AgeSecretHandler::new(store, RetryPolicy::from_config(&config));
        Self {
            client,
            handler: Arc::new(handler),
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with_state<T>(&self, resource_key: &str, f: impl FnOnce(&mut BackoffState) -> T) -> T {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(states.entry(resource_key.to_string()).or_default())
    }

    /// Reset the error count when the spec moved to a new generation
    pub fn observe_generation(&self, resource_key: &str, generation: Option<i64>) {
        self.with_state(resource_key, |state| {
            if state.generation != generation {
                state.reset();
                state.generation = generation;
            }
        });
    }

    /// Consecutive failures recorded for the resource
    #[must_use]
    pub fn failure_counts(&self, resource_key: &str) -> FailureCounts {
        self.with_state(resource_key, |state| state.counts())
    }

    /// Record one more failure and return the counts so far with the next Fibonacci delay
    pub fn record_failure(&self, resource_key: &str, transient: bool) -> (FailureCounts, Duration) {
        self.with_state(resource_key, |state| {
            let counts = state.counts().after(transient);
            state.error_count = counts.attempts;
            state.permanent_count = counts.permanent;
            (counts, state.backoff.next_backoff())
        })
    }

    /// Reset backoff after success, returning whether the resource was backing off
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        self.with_state(resource_key, |state| {
            let had_errors = state.error_count > 0;
            state.reset();
            had_errors
        })
    }

    /// Forget all state for a resource that has been cleaned up
    pub fn forget(&self, resource_key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(resource_key);
    }
}

/// `namespace/name` key used for per-resource state
#[must_use]
pub fn resource_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AgeSecretSpec, AgeSecretStatus};

    fn resource(generation: i64, status: Option<AgeSecretStatus>) -> AgeSecret {
        let mut resource = AgeSecret::new(
            "db",
            AgeSecretSpec {
                secret: "ENC[AAAA]".to_string(),
                secret_name: "db-cred".to_string(),
                secret_key: "password".to_string(),
                age_secret_ref: "age-key".to_string(),
                identity_key: "secretKey".to_string(),
            },
        );
        resource.metadata.generation = Some(generation);
        resource.status = status;
        resource
    }

    #[test]
    fn test_transience_classification() {
        assert!(!ReconcilerError::Transform(TransformError::Decryption(String::new())).is_transient());
        assert!(!ReconcilerError::InvalidResource(String::new()).is_transient());
        assert!(ReconcilerError::IdentityUnavailable {
            namespace: "ns".to_string(),
            secret: "age-key".to_string(),
            reason: "not found".to_string(),
        }
        .is_transient());
        assert!(ReconcilerError::StoreUnavailable(StoreError::Timeout {
            operation: "upsert",
            timeout: Duration::from_secs(1),
        })
        .is_transient());
    }

    #[test]
    fn test_finalizer_wrapping_keeps_classification() {
        let wrapped = ReconcilerError::Finalizer(Box::new(
            kube_runtime::finalizer::Error::ApplyFailed(ReconcilerError::Transform(
                TransformError::MalformedEnvelope(String::new()),
            )),
        ));
        assert!(!wrapped.is_transient());
        assert_eq!(wrapped.reason(), "malformed_envelope");
        assert!(matches!(wrapped.root(), ReconcilerError::Transform(_)));
    }

    #[test]
    fn test_transient_failures_do_not_count_as_permanent() {
        let mut counts = FailureCounts::default();
        for _ in 0..4 {
            counts = counts.after(true);
        }
        counts = counts.after(false);
        assert_eq!(
            counts,
            FailureCounts {
                attempts: 5,
                permanent: 1
            }
        );
    }

    #[test]
    fn test_backoff_state_reset_clears_both_counts() {
        let mut state = BackoffState {
            error_count: 3,
            permanent_count: 2,
            ..BackoffState::default()
        };
        state.reset();
        assert_eq!(state.counts(), FailureCounts::default());
    }

    #[test]
    fn test_reconcile_state_observation() {
        assert_eq!(ReconcileState::observe(None), ReconcileState::Absent);
        assert_eq!(
            ReconcileState::observe(Some(&resource(1, None))),
            ReconcileState::ResourcePresentSecretAbsent
        );

        let reconciled = AgeSecretStatus {
            phase: Some("Reconciled".to_string()),
            destination_secret: Some("db-cred".to_string()),
            observed_generation: Some(1),
            ..AgeSecretStatus::default()
        };
        assert_eq!(
            ReconcileState::observe(Some(&resource(1, Some(reconciled.clone())))),
            ReconcileState::Reconciled
        );
        // Spec edited since the last successful write
        assert_eq!(
            ReconcileState::observe(Some(&resource(2, Some(reconciled)))),
            ReconcileState::ResourcePresentSecretAbsent
        );
    }
}
