//! AgeSecret Controller Library
//!
//! Core functionality for the AgeSecret controller and the `agesecret` CLI:
//! the age transform engine, the `AgeSecret` CRD, and the reconciler that
//! turns AgeSecrets into native Kubernetes Secrets.
//!
//! ## Quick Start
//!
//! ```rust
//! use age_secret_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod transform;
