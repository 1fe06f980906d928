//! # Transform Errors
//!
//! Error taxonomy for the encrypt/decrypt transform.
//!
//! Every variant is permanent: retrying the same input with the same key
//! produces the same failure, so callers must surface these errors instead
//! of scheduling retries.

use thiserror::Error;

/// Errors produced by the transform engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The recipient (public key) string could not be parsed
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The identity (private key) material could not be parsed
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// `spec.secret` already carries an `ENC[...]` envelope
    #[error("secret is already encrypted")]
    AlreadyEncrypted,

    /// The encryption primitive failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The identity does not match the recipient, or the ciphertext is corrupt
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The `ENC[...]` wrapper is present but its payload is not valid base64
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The manifest is missing a required field or has the wrong shape
    #[error("schema error: {0}")]
    Schema(String),
}

impl TransformError {
    /// Stable label used for metrics and status reporting
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            TransformError::InvalidRecipient(_) => "invalid_recipient",
            TransformError::InvalidIdentity(_) => "invalid_identity",
            TransformError::AlreadyEncrypted => "already_encrypted",
            TransformError::Encryption(_) => "encryption_failure",
            TransformError::Decryption(_) => "decryption_failure",
            TransformError::MalformedEnvelope(_) => "malformed_envelope",
            TransformError::Schema(_) => "schema_error",
        }
    }

    /// Operator-facing hint for fixing the failure
    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            TransformError::InvalidRecipient(_) => {
                "Pass an age X25519 recipient of the form age1..."
            }
            TransformError::InvalidIdentity(_) => {
                "Store an age X25519 identity (AGE-SECRET-KEY-1...) in the referenced secret"
            }
            TransformError::AlreadyEncrypted => {
                "Decrypt the manifest first or commit it as-is; it is already encrypted"
            }
            TransformError::Encryption(_) => "Check the recipient and retry the encryption",
            TransformError::Decryption(_) => {
                "Re-encrypt spec.secret for the recipient matching the cluster identity"
            }
            TransformError::MalformedEnvelope(_) => {
                "Re-encrypt spec.secret; the ENC[...] payload is not valid base64"
            }
            TransformError::Schema(_) => {
                "Ensure spec.secret, spec.secretName and spec.secretKey are present strings"
            }
        }
    }
}
