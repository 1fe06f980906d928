//! # Manifest
//!
//! An AgeSecret manifest as read from disk or version control.
//!
//! The full YAML document is kept as an ordered `serde_yaml::Value` so that
//! rewriting `spec.secret` leaves every other field, and the field order,
//! untouched. A typed view of the `spec` fields is validated at decode time.

use crate::transform::TransformError;
use serde::Deserialize;
use serde_yaml::Value;

const REQUIRED_SPEC_FIELDS: [&str; 3] = ["secret", "secretName", "secretKey"];

/// Typed view of the `spec` block
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFields {
    /// Plaintext or `ENC[...]` envelope
    pub secret: String,
    /// Destination native secret name
    pub secret_name: String,
    /// Destination data key
    pub secret_key: String,
    /// Native secret holding the decrypting identity
    #[serde(default)]
    pub age_secret_ref: Option<String>,
    /// Data key inside `age_secret_ref` holding the identity
    #[serde(default)]
    pub identity_key: Option<String>,
}

impl std::fmt::Debug for ManifestFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestFields")
            .field("secret", &"***")
            .field("secret_name", &self.secret_name)
            .field("secret_key", &self.secret_key)
            .field("age_secret_ref", &self.age_secret_ref)
            .field("identity_key", &self.identity_key)
            .finish()
    }
}

/// A validated manifest document
#[derive(Clone, PartialEq)]
pub struct Manifest {
    document: Value,
    fields: ManifestFields,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Manifest {
    /// Parse and validate a YAML manifest
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TransformError> {
        let document: Value = serde_yaml::from_str(yaml)
            .map_err(|e| TransformError::Schema(format!("invalid YAML: {e}")))?;
        Self::from_value(document)
    }

    /// Validate an already-parsed YAML document
    pub fn from_value(document: Value) -> Result<Self, TransformError> {
        let spec = document
            .get("spec")
            .ok_or_else(|| TransformError::Schema("missing `spec`".to_string()))?;

        if !spec.is_mapping() {
            return Err(TransformError::Schema(
                "`spec` must be a mapping".to_string(),
            ));
        }

        for field in REQUIRED_SPEC_FIELDS {
            match spec.get(field) {
                None | Some(Value::Null) => {
                    return Err(TransformError::Schema(format!(
                        "missing required field `spec.{field}`"
                    )));
                }
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(TransformError::Schema(format!(
                        "`spec.{field}` must be a string"
                    )));
                }
            }
        }

        let fields: ManifestFields = serde_yaml::from_value(spec.clone())
            .map_err(|e| TransformError::Schema(e.to_string()))?;

        Ok(Self { document, fields })
    }

    /// Typed `spec` fields
    #[must_use]
    pub fn fields(&self) -> &ManifestFields {
        &self.fields
    }

    /// Current `spec.secret` value
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.fields.secret
    }

    /// The underlying YAML document
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Return a copy with `spec.secret` replaced, all other fields untouched
    #[must_use]
    pub fn with_secret(&self, secret: &str) -> Self {
        let mut document = self.document.clone();
        if let Some(spec) = document.get_mut("spec").and_then(Value::as_mapping_mut) {
            // Mapping::insert keeps the existing key position
            spec.insert(
                Value::String("secret".to_string()),
                Value::String(secret.to_string()),
            );
        }

        let mut fields = self.fields.clone();
        fields.secret = secret.to_string();

        Self { document, fields }
    }

    /// Serialize back to YAML
    pub fn to_yaml_string(&self) -> Result<String, TransformError> {
        serde_yaml::to_string(&self.document)
            .map_err(|e| TransformError::Schema(format!("failed to serialize manifest: {e}")))
    }
}
