//! # AgeSecret Controller
//!
//! A Kubernetes controller that decrypts age-encrypted `AgeSecret` resources
//! into native Kubernetes Secrets.
//!
//! ## Overview
//!
//! 1. **Watching AgeSecrets** - Monitors `AgeSecret` resources in all namespaces, or `WATCH_NAMESPACE`
//! 2. **Resolving identities** - Reads the age identity from the secret named by `spec.ageSecretRef`
//! 3. **Decrypting** - Opens the `ENC[...]` envelope in `spec.secret`
//! 4. **Writing native secrets** - Server-side applies `spec.secretName` with the decrypted value
//! 5. **Cleaning up** - Deletes the native secret when the AgeSecret is deleted
//!
//! Prometheus metrics and health probes are served on `METRICS_PORT`.

use age_secret_controller::runtime::{initialize, run_watch_loop};
use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    let result = run_watch_loop(
        Arc::clone(&init.reconciler),
        Arc::clone(&init.server_state),
    )
    .await;

    init.shutdown().await;
    result
}
