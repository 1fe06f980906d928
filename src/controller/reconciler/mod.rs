//! # Reconciler
//!
//! Core reconciliation logic for `AgeSecret` resources.
//!
//! The reconciler:
//! - Watches `AgeSecret` resources (all namespaces, or `WATCH_NAMESPACE`)
//! - Resolves the age identity from the secret named by `spec.ageSecretRef`
//! - Decrypts `spec.secret` and writes it to the native secret `spec.secretName`
//! - Deletes that native secret when the AgeSecret is deleted
//! - Updates resource status with reconciliation results
//!
//! ## Reconciliation Flow
//!
//! 1. Add the cleanup finalizer if missing
//! 2. Read the identity secret (`WaitingForIdentity` while it is missing)
//! 3. Decrypt, or pass an unencrypted value through unchanged
//! 4. Server-side apply the native secret
//! 5. Remove a stale native secret left by a `secretName` change
//! 6. Update status and requeue for the next resync

pub mod handler;
pub mod reconcile;
pub mod retry;
pub mod status;
pub mod store;
pub mod types;

// Re-export public API
pub use handler::{AgeSecretHandler, ApplyOutcome, CleanupOutcome, ResourceEvent};
pub use reconcile::reconcile;
pub use retry::{with_retry, RetryPolicy};
pub use store::{DeleteOutcome, KubeSecretStore, NativeSecret, SecretData, SecretStore, StoreError};
pub use types::{
    resource_key, BackoffState, DecryptionStatus, FailureCounts, Phase, ReconcileState, Reconciler,
    ReconcilerError,
};
