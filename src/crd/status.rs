//! # AgeSecret Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the AgeSecret resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgeSecretStatus {
    /// Current phase of reconciliation
    /// Values: Pending, Reconciled, Failed, Degraded, WaitingForIdentity
    #[serde(default)]
    pub phase: Option<String>,
    /// Human-readable description of current state
    #[serde(default)]
    pub description: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Name of the native secret last written for this resource
    /// Used to remove the old secret when `spec.secretName` changes
    #[serde(default)]
    pub destination_secret: Option<String>,
    /// Decryption status
    /// Values: Success, PermanentFailure, NotEncrypted
    #[serde(default)]
    pub decryption_status: Option<String>,
    /// Last decryption error message (if any)
    #[serde(default)]
    pub last_decryption_error: Option<String>,
    /// Consecutive failed reconciliations for the current generation
    #[serde(default)]
    pub failed_attempts: Option<u32>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
