//! # AgeSecret Handler
//!
//! Converges native secret state for one AgeSecret.
//!
//! - `apply`: resolve identity, decrypt, upsert the destination secret, then
//!   drop a stale destination left behind by a rename.
//! - `cleanup`: delete the destination secret (and a stale one, if any).
//!
//! The handler is generic over [`SecretStore`] and holds no cluster client of
//! its own, so it runs unchanged against an in-memory store in tests.

use crate::controller::reconciler::retry::{with_retry, RetryPolicy};
use crate::controller::reconciler::store::{DeleteOutcome, NativeSecret, SecretStore};
use crate::controller::reconciler::types::{resource_key, DecryptionStatus, ReconcilerError};
use crate::crd::AgeSecretSpec;
use crate::observability;
use crate::transform::{decrypt_value, parse_identity, DecryptedValue, TransformError};
use age::x25519::Identity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// One AgeSecret as seen by the handler
#[derive(Debug, Clone)]
pub struct ResourceEvent<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub spec: &'a AgeSecretSpec,
    /// Destination recorded in status by the last successful apply
    pub previous_destination: Option<&'a str>,
    pub owner_reference: Option<OwnerReference>,
}

impl ResourceEvent<'_> {
    /// Previous destination when it differs from the current one
    fn stale_destination(&self) -> Option<&str> {
        self.previous_destination
            .filter(|previous| *previous != self.spec.secret_name)
    }
}

/// Result of a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub destination: String,
    pub decryption: DecryptionStatus,
    /// Stale destination removed after a rename
    pub removed_stale: Option<String>,
}

/// Result of a successful cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOutcome {
    /// `(secret name, outcome)` for every destination touched
    pub deleted: Vec<(String, DeleteOutcome)>,
}

type DestinationLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Exclusive access to one destination secret
///
/// Dropping the lease unlocks the destination and removes its map entry once
/// no other task holds or waits for it.
struct DestinationLease<'a> {
    locks: &'a DestinationLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DestinationLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

pub struct AgeSecretHandler<S> {
    store: S,
    retry: RetryPolicy,
    // Locks per destination secret (identified by namespace/secretName)
    // Serializes writes and deletes of the same native secret across AgeSecrets
    destination_locks: DestinationLocks,
}

impl<S> std::fmt::Debug for AgeSecretHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeSecretHandler")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<S: SecretStore> AgeSecretHandler<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            destination_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Destinations with a lock currently held or awaited
    #[must_use]
    pub fn locked_destinations(&self) -> usize {
        self.destination_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait for exclusive access to one destination secret
    async fn lock_destination(&self, namespace: &str, name: &str) -> DestinationLease<'_> {
        let key = resource_key(namespace, name);
        let lock = {
            let mut locks = self
                .destination_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        DestinationLease {
            locks: &self.destination_locks,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Read the identity referenced by `spec.ageSecretRef`/`spec.identityKey`
    pub async fn resolve_identity(
        &self,
        namespace: &str,
        spec: &AgeSecretSpec,
    ) -> Result<Identity, ReconcilerError> {
        let unavailable = |reason: String| ReconcilerError::IdentityUnavailable {
            namespace: namespace.to_string(),
            secret: spec.age_secret_ref.clone(),
            reason,
        };

        let data = with_retry(&self.retry, "get", || {
            self.store.get(namespace, &spec.age_secret_ref)
        })
        .await?
        .ok_or_else(|| unavailable("secret not found".to_string()))?;

        let material = data
            .get(&spec.identity_key)
            .ok_or_else(|| unavailable(format!("key '{}' not found", spec.identity_key)))?;

        let material = std::str::from_utf8(material).map_err(|e| {
            TransformError::InvalidIdentity(format!("identity is not valid UTF-8: {e}"))
        })?;

        Ok(parse_identity(material)?)
    }

    /// Decrypt `spec.secret` and write it to the destination secret
    pub async fn apply(&self, event: &ResourceEvent<'_>) -> Result<ApplyOutcome, ReconcilerError> {
        let spec = event.spec;
        let identity = self.resolve_identity(event.namespace, spec).await?;

        let (plaintext, decryption) = match decrypt_value(&spec.secret, &identity) {
            Ok(DecryptedValue::Plaintext(plaintext)) => {
                observability::metrics::increment_decryptions();
                (plaintext, DecryptionStatus::Success)
            }
            Ok(DecryptedValue::AlreadyDecrypted) => {
                debug!("spec.secret is not encrypted, writing it unchanged");
                (Zeroizing::new(spec.secret.clone()), DecryptionStatus::NotEncrypted)
            }
            Err(e) => {
                observability::metrics::increment_decryption_errors(e.reason());
                return Err(e.into());
            }
        };

        let secret = NativeSecret {
            name: spec.secret_name.clone(),
            key: spec.secret_key.clone(),
            value: Zeroizing::new(plaintext.as_bytes().to_vec()),
            owner_name: event.name.to_string(),
            owner_reference: event.owner_reference.clone(),
        };

        {
            let _lease = self.lock_destination(event.namespace, &secret.name).await;
            with_retry(&self.retry, "upsert", || {
                self.store.upsert(event.namespace, &secret)
            })
            .await?;
        }
        observability::metrics::increment_native_secrets_written();
        info!(
            "Wrote secret {}/{} (key: {})",
            event.namespace, secret.name, secret.key
        );

        let removed_stale = match event.stale_destination() {
            Some(stale) => {
                self.delete_destination(event.namespace, stale).await?;
                info!(
                    "Removed secret {}/{} after destination was renamed to {}",
                    event.namespace, stale, secret.name
                );
                Some(stale.to_string())
            }
            None => None,
        };

        Ok(ApplyOutcome {
            destination: secret.name,
            decryption,
            removed_stale,
        })
    }

    /// Delete every destination secret derived from the resource
    pub async fn cleanup(
        &self,
        event: &ResourceEvent<'_>,
    ) -> Result<CleanupOutcome, ReconcilerError> {
        let mut targets = vec![event.spec.secret_name.as_str()];
        targets.extend(event.stale_destination());

        let mut deleted = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.delete_destination(event.namespace, target).await?;
            deleted.push((target.to_string(), outcome));
        }

        Ok(CleanupOutcome { deleted })
    }

    async fn delete_destination(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, ReconcilerError> {
        let _lease = self.lock_destination(namespace, name).await;

        let outcome = with_retry(&self.retry, "delete", || self.store.delete(namespace, name)).await?;
        match outcome {
            DeleteOutcome::Deleted => {
                observability::metrics::increment_native_secrets_deleted();
                info!("Deleted secret {}/{}", namespace, name);
            }
            DeleteOutcome::AlreadyAbsent => {
                debug!("Secret {}/{} was already absent", namespace, name);
            }
        }
        Ok(outcome)
    }
}
