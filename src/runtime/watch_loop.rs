//! # Watch Loop
//!
//! Controller watch loop that monitors AgeSecret resources, the native secrets
//! they own and the identity secrets they reference, and triggers
//! reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::constants::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::AgeSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::{Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// AgeSecret and owned Secret APIs, scoped to `WATCH_NAMESPACE` when set
fn watched_apis(client: &Client, config: &ControllerConfig) -> (Api<AgeSecret>, Api<Secret>) {
    match config.watch_namespace.as_deref() {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client.clone(), namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    }
}

/// AgeSecrets in the secret's namespace whose `ageSecretRef` names it
///
/// A created or repaired identity secret wakes these up, including ones that
/// stopped retrying after a permanent failure.
fn referencing_age_secrets(
    age_secrets: &[Arc<AgeSecret>],
    secret: &Secret,
) -> Vec<ObjectRef<AgeSecret>> {
    let name = secret.name_any();
    let namespace = secret.namespace();
    age_secrets
        .iter()
        .filter(|age_secret| {
            age_secret.spec.age_secret_ref == name && age_secret.namespace() == namespace
        })
        .map(|age_secret| ObjectRef::from_obj(age_secret.as_ref()))
        .collect()
}

/// Run the controller watch loop
///
/// On SIGTERM/SIGINT readiness drops and the controller stops once in-flight
/// reconciliations finish. Any other end of the stream restarts the watch after
/// `WATCH_RESTART_DELAY_SECS`.
pub async fn run_watch_loop(
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = Arc::clone(&reconciler.config);
    let (age_secrets, secrets) = watched_apis(&reconciler.client, &config);
    let owned_selector = format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}");
    let identity_selector = format!("{MANAGED_BY_LABEL}!={MANAGED_BY_VALUE}");
    let backoff_ms = Arc::new(AtomicU64::new(config.backoff_start_ms));

    // Readiness drops before the controller is told to stop
    let (stop_tx, stop_rx) = watch::channel(false);
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, waiting for in-flight reconciliations to complete...");
        shutdown_state.set_ready(false);
        let _ = stop_tx.send(true);
    });

    server_state.set_ready(true);

    loop {
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop",
            namespace = config.watch_namespace.as_deref().unwrap_or("*")
        );

        info!(
            "Starting controller watch loop (concurrency: {})...",
            config.max_concurrent_reconciliations
        );

        let backoff = Arc::clone(&backoff_ms);
        let filter_config = Arc::clone(&config);
        let mut stop = stop_rx.clone();
        let controller =
            Controller::new(age_secrets.clone(), watcher::Config::default().any_semantic());
        let cache = controller.store();
        controller
            .owns(
                secrets.clone(),
                watcher::Config::default().labels(&owned_selector),
            )
            .watches(
                secrets.clone(),
                watcher::Config::default().labels(&identity_selector),
                move |secret: Secret| referencing_age_secrets(&cache.state(), &secret),
            )
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .graceful_shutdown_on(async move {
                let _ = stop.wait_for(|stopping| *stopping).await;
            })
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .for_each(move |result| {
                let backoff = Arc::clone(&backoff);
                let config = Arc::clone(&filter_config);
                async move {
                    match result {
                        Ok((object, _action)) => {
                            backoff.store(config.backoff_start_ms, Ordering::Relaxed);
                            debug!("watch.event.success: {}", object);
                        }
                        Err(controller::Error::ReconcilerFailed(_, object)) => {
                            // Already handled by the error policy
                            debug!("watch.event.reconcile_failed: {}", object);
                        }
                        Err(e) => {
                            handle_watch_stream_error(
                                &format!("{e:?}"),
                                &backoff,
                                config.backoff_max_ms,
                                config.watch_restart_delay_duration(),
                            )
                            .await;
                        }
                    }
                }
            })
            .instrument(watch_span)
            .await;

        if *stop_rx.borrow() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            config.watch_restart_delay_secs
        );
        tokio::time::sleep(config.watch_restart_delay_duration()).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
