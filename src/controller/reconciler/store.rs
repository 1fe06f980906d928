//! # Native Secret Store
//!
//! The reconciler reads identities from, and writes decrypted values to,
//! native Kubernetes `Secret` objects through the [`SecretStore`] trait.
//! [`KubeSecretStore`] is the cluster implementation; tests substitute an
//! in-memory store.

use crate::constants::{FIELD_MANAGER, MANAGED_BY_LABEL, MANAGED_BY_VALUE, OWNER_ANNOTATION};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Data entries of a native secret
pub type SecretData = BTreeMap<String, Zeroizing<Vec<u8>>>;

/// Failure talking to the native secret API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        /// HTTP status code, `None` for transport failures
        code: Option<u16>,
        message: String,
    },
}

impl StoreError {
    /// Convert a kube client error for `operation`
    #[must_use]
    pub fn from_kube(operation: &'static str, error: &kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => StoreError::Api {
                operation,
                code: Some(response.code),
                message: response.message.clone(),
            },
            other => StoreError::Api {
                operation,
                code: None,
                message: other.to_string(),
            },
        }
    }

    /// Whether the same call may succeed if repeated immediately
    ///
    /// Timeouts, transport failures, conflicts, throttling and server errors
    /// are retryable. Other client errors (403, 422...) are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout { .. } | StoreError::Api { code: None, .. } => true,
            StoreError::Api {
                code: Some(code), ..
            } => *code >= 500 || *code == 429 || *code == 409,
        }
    }
}

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// A derived native secret holding a single decrypted entry
#[derive(Clone)]
pub struct NativeSecret {
    pub name: String,
    pub key: String,
    pub value: Zeroizing<Vec<u8>>,
    /// Name of the AgeSecret that produced this secret
    pub owner_name: String,
    pub owner_reference: Option<OwnerReference>,
}

impl std::fmt::Debug for NativeSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSecret")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("value", &"***")
            .field("owner_name", &self.owner_name)
            .finish_non_exhaustive()
    }
}

impl NativeSecret {
    /// Render as an Opaque `Secret` object for server-side apply
    ///
    /// The value is copied into a plain `ByteString`; pass the result to
    /// [`scrub_secret_data`] once it is no longer needed.
    #[must_use]
    pub fn to_secret(&self, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                annotations: Some(BTreeMap::from([(
                    OWNER_ANNOTATION.to_string(),
                    self.owner_name.clone(),
                )])),
                owner_references: self.owner_reference.clone().map(|owner| vec![owner]),
                ..ObjectMeta::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(BTreeMap::from([(
                self.key.clone(),
                ByteString(self.value.to_vec()),
            )])),
            ..Secret::default()
        }
    }
}

/// Zero the data values of a rendered or fetched `Secret` in place
pub fn scrub_secret_data(secret: &mut Secret) {
    for value in secret.data.iter_mut().flat_map(BTreeMap::values_mut) {
        value.0.zeroize();
    }
}

/// Namespaced access to native secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the data of a secret, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError>;

    /// Create or overwrite a secret
    async fn upsert(&self, namespace: &str, secret: &NativeSecret) -> Result<(), StoreError>;

    /// Delete a secret; a missing secret is not an error
    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, StoreError>;
}

/// [`SecretStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError> {
        let secret = self
            .api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| StoreError::from_kube("get", &e))?;

        Ok(secret.map(|secret| {
            secret
                .data
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (key, Zeroizing::new(value.0)))
                .collect()
        }))
    }

    async fn upsert(&self, namespace: &str, secret: &NativeSecret) -> Result<(), StoreError> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let mut rendered = secret.to_secret(namespace);
        let result = self
            .api(namespace)
            .patch(&secret.name, &params, &Patch::Apply(&rendered))
            .await;
        scrub_secret_data(&mut rendered);

        // The API server echoes the applied object, data included
        let mut applied = result.map_err(|e| StoreError::from_kube("upsert", &e))?;
        scrub_secret_data(&mut applied);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, StoreError> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(StoreError::from_kube("delete", &e)),
        }
    }
}
