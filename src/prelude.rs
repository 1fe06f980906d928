//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use age_secret_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - CRD types (`AgeSecret`, `AgeSecretSpec`, `AgeSecretStatus`)
//! - Transform engine entry points and errors
//! - Reconciler types and the secret store seam
//! - Controller configuration

// CRD types - most commonly used
pub use crate::crd::*;

// Transform engine
pub use crate::transform::{
    decrypt, decrypt_value, encrypt, encrypt_value, Decrypted, DecryptedValue, Manifest,
    TransformError,
};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, AgeSecretHandler, Reconciler, ReconcilerError, SecretStore, StoreError,
};

// Config types
pub use crate::config::ControllerConfig;
