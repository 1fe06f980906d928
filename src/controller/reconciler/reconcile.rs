//! # Reconcile
//!
//! kube-runtime entry point. Wraps every AgeSecret in a finalizer so that
//! deletions are observed, then dispatches to the handler:
//!
//! - `Event::Apply` (create and update) decrypts and upserts the native secret
//! - `Event::Cleanup` (deletion) removes it

use crate::constants::FINALIZER_NAME;
use crate::controller::reconciler::handler::ResourceEvent;
use crate::controller::reconciler::status::{failure_status, success_status, update_status};
use crate::controller::reconciler::types::{resource_key, ReconcileState, Reconciler, ReconcilerError};
use crate::crd::AgeSecret;
use crate::observability;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Reconcile one AgeSecret
pub async fn reconcile(
    resource: Arc<AgeSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    observability::metrics::increment_reconciliations();

    let name = resource.name_any();
    let namespace = resource.namespace().ok_or_else(|| {
        ReconcilerError::InvalidResource(format!("AgeSecret {name} has no namespace"))
    })?;

    let span = tracing::info_span!(
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "AgeSecret",
        resource.generation = resource.metadata.generation.unwrap_or(0),
    );

    async move {
        let api: Api<AgeSecret> = Api::namespaced(ctx.client.clone(), &namespace);
        let result = finalizer(&api, FINALIZER_NAME, resource, |event| async move {
            match event {
                Event::Apply(resource) => apply(&resource, &ctx).await,
                Event::Cleanup(resource) => cleanup(&resource, &ctx).await,
            }
        })
        .await
        .map_err(|e| ReconcilerError::Finalizer(Box::new(e)));

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        result
    }
    .instrument(span)
    .await
}

fn resource_event(resource: &AgeSecret) -> Result<ResourceEvent<'_>, ReconcilerError> {
    let name = resource
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ReconcilerError::InvalidResource("AgeSecret has no name".to_string()))?;
    let namespace = resource.metadata.namespace.as_deref().ok_or_else(|| {
        ReconcilerError::InvalidResource(format!("AgeSecret {name} has no namespace"))
    })?;

    Ok(ResourceEvent {
        name,
        namespace,
        spec: &resource.spec,
        previous_destination: resource
            .status
            .as_ref()
            .and_then(|s| s.destination_secret.as_deref()),
        owner_reference: resource.controller_owner_ref(&()),
    })
}

async fn apply(resource: &AgeSecret, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let event = resource_event(resource)?;
    let key = resource_key(event.namespace, event.name);
    let generation = resource.metadata.generation;
    let previous_status = resource.status.as_ref();

    ctx.observe_generation(&key, generation);
    debug!(
        "Applying AgeSecret (state: {:?})",
        ReconcileState::observe(Some(resource))
    );

    let now = chrono::Utc::now().to_rfc3339();
    match ctx.handler.apply(&event).await {
        Ok(outcome) => {
            let was_in_backoff = ctx.reset_backoff(&key);
            let status = success_status(previous_status, generation, &outcome, &now);
            if let Err(e) = update_status(ctx, resource, &status).await {
                warn!("Failed to update status: {}", e);
            }

            if was_in_backoff {
                info!("🔄 Backoff reset: returning to normal resync schedule");
            }
            info!(
                "✅ Reconciled {} -> secret {} ({})",
                event.name,
                outcome.destination,
                outcome.decryption.as_str()
            );

            observability::metrics::increment_requeues("resync");
            Ok(Action::requeue(ctx.config.resync_interval_duration()))
        }
        Err(e) => {
            // The error policy records the failure; report the counts it will reach
            let counts = ctx.failure_counts(&key).after(e.is_transient());
            let status = failure_status(
                previous_status,
                generation,
                &e,
                counts,
                ctx.config.max_permanent_failures,
                &now,
            );
            if let Err(status_err) = update_status(ctx, resource, &status).await {
                warn!("Failed to update status: {}", status_err);
            }
            Err(e)
        }
    }
}

async fn cleanup(resource: &AgeSecret, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let event = resource_event(resource)?;

    match ctx.handler.cleanup(&event).await {
        Ok(outcome) => {
            ctx.forget(&resource_key(event.namespace, event.name));
            info!(
                "🧹 Cleaned up AgeSecret {} ({} secret(s) handled)",
                event.name,
                outcome.deleted.len()
            );
            Ok(Action::await_change())
        }
        Err(e) => {
            error!("Cleanup failed for {}: {}", event.name, e);
            Err(e)
        }
    }
}
