//! # Custom Resource Definitions
//!
//! CRD types for the AgeSecret controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Main CRD specification and default values
//! - `status.rs` - Status types for tracking reconciliation state

mod spec;
mod status;

// Re-export all public types
pub use spec::{default_identity_key, AgeSecret, AgeSecretSpec};
pub use status::{AgeSecretStatus, Condition};
