//! # AgeSecret Spec
//!
//! Main CRD specification type and default values.

use crate::constants::DEFAULT_IDENTITY_KEY;
use serde::{Deserialize, Serialize};

/// AgeSecret Custom Resource Definition
///
/// Carries one age-encrypted value that the controller decrypts into a
/// native `Secret` in the same namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: pyvo.io/v1
/// kind: AgeSecret
/// metadata:
///   name: db
///   namespace: default
/// spec:
///   secret: "ENC[YWdlLWVuY3J5cHRpb24ub3JnL3YxCi0+...]"
///   secretName: db-cred
///   secretKey: password
///   ageSecretRef: age-key
/// ```
#[derive(kube::CustomResource, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AgeSecret",
    group = "pyvo.io",
    version = "v1",
    namespaced,
    status = "crate::crd::AgeSecretStatus",
    shortname = "ags",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgeSecretSpec {
    /// Encrypted value in `ENC[<base64>]` form
    /// A plain value is written through unchanged
    pub secret: String,
    /// Name of the native secret to create in the same namespace
    pub secret_name: String,
    /// Data key of the native secret that receives the decrypted value
    pub secret_key: String,
    /// Name of the native secret holding the age identity (AGE-SECRET-KEY-1...)
    pub age_secret_ref: String,
    /// Data key inside `ageSecretRef` holding the identity
    /// Default: "secretKey"
    #[serde(default = "default_identity_key")]
    pub identity_key: String,
}

impl std::fmt::Debug for AgeSecretSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeSecretSpec")
            .field("secret", &"***")
            .field("secret_name", &self.secret_name)
            .field("secret_key", &self.secret_key)
            .field("age_secret_ref", &self.age_secret_ref)
            .field("identity_key", &self.identity_key)
            .finish()
    }
}

/// Default value for identity key
pub fn default_identity_key() -> String {
    DEFAULT_IDENTITY_KEY.to_string()
}
