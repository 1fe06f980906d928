//! Common test utilities
//!
//! In-memory [`SecretStore`] with failure injection, plus key and spec
//! fixtures shared by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use age::secrecy::ExposeSecret;
use age::x25519::Identity;
use age_secret_controller::controller::reconciler::{
    AgeSecretHandler, DeleteOutcome, NativeSecret, RetryPolicy, SecretData, SecretStore,
    StoreError,
};
use age_secret_controller::crd::AgeSecretSpec;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use zeroize::Zeroizing;

pub const NAMESPACE: &str = "payments";
pub const IDENTITY_SECRET: &str = "age-key";

/// Native secrets keyed by `(namespace, name)`
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), SecretData>>,
    failures: Mutex<VecDeque<(&'static str, StoreError)>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret with a single data entry
    pub fn insert(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
        let data = SecretData::from([(key.to_string(), Zeroizing::new(value.to_vec()))]);
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
    }

    /// Store `identity` the way `age-keygen` writes it
    pub fn insert_identity(&self, namespace: &str, name: &str, key: &str, identity: &Identity) {
        let material = format!(
            "# public key: {}\n{}\n",
            identity.to_public(),
            identity.to_string().expose_secret()
        );
        self.insert(namespace, name, key, material.as_bytes());
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        self.secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn value(&self, namespace: &str, name: &str, key: &str) -> Option<Vec<u8>> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .and_then(|data| data.get(key))
            .map(|value| value.to_vec())
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.secrets
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    /// Fail the next `operation` call with `error`
    pub fn fail_next(&self, operation: &'static str, error: StoreError) {
        self.failures.lock().unwrap().push_back((operation, error));
    }

    /// Number of calls made for `operation`, including failed ones
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    fn record(&self, operation: &'static str) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(operation);
        let mut failures = self.failures.lock().unwrap();
        match failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(failures.remove(index).map(|(_, e)| e).unwrap()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError> {
        self.record("get")?;
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn upsert(&self, namespace: &str, secret: &NativeSecret) -> Result<(), StoreError> {
        self.record("upsert")?;
        let data = SecretData::from([(secret.key.clone(), secret.value.clone())]);
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), secret.name.clone()), data);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<DeleteOutcome, StoreError> {
        self.record("delete")?;
        let removed = self
            .secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(match removed {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::AlreadyAbsent,
        })
    }
}

/// Retry policy with millisecond delays
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        max_attempts: 3,
        backoff_start: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
    }
}

pub fn handler(store: MemorySecretStore) -> AgeSecretHandler<MemorySecretStore> {
    AgeSecretHandler::new(store, fast_retry())
}

/// Spec writing `secret` to `db-cred/password`, identity from `age-key/secretKey`
pub fn spec(secret: &str) -> AgeSecretSpec {
    AgeSecretSpec {
        secret: secret.to_string(),
        secret_name: "db-cred".to_string(),
        secret_key: "password".to_string(),
        age_secret_ref: IDENTITY_SECRET.to_string(),
        identity_key: "secretKey".to_string(),
    }
}

pub fn api_error(operation: &'static str, code: u16) -> StoreError {
    StoreError::Api {
        operation,
        code: Some(code),
        message: format!("injected {code}"),
    }
}
