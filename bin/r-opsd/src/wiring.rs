//! ---
//! ops_section: "04-runtime"
//! ops_subsection: "binary"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Collaborator wiring for the daemon."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use r_ops_common::AppConfig;
use r_ops_failover::adapters::{
    HttpControlPlane, LogNotificationSink, PrometheusMetricSink, SimulatedCloud,
    WebhookNotificationSink,
};
use r_ops_failover::{Collaborators, DisasterRecoveryOrchestrator, MetricSink, NotificationSink};
use r_ops_metrics::{DisasterRecoveryMetrics, SharedRegistry};
use tracing::info;

/// Build an orchestrator whose outcome metrics land in `registry`.
pub fn build_orchestrator(
    config: &AppConfig,
    registry: SharedRegistry,
) -> Result<DisasterRecoveryOrchestrator> {
    let notifications: Arc<dyn NotificationSink> = match &config.control_plane.webhook_url {
        Some(url) => Arc::new(WebhookNotificationSink::new(
            url.clone(),
            config.control_plane.request_timeout,
        )?),
        None => Arc::new(LogNotificationSink),
    };
    let metrics: Arc<dyn MetricSink> = Arc::new(PrometheusMetricSink::new(
        DisasterRecoveryMetrics::new(registry)?,
    ));

    let collaborators = if config.mode.is_simulation() {
        info!("wiring in-memory control plane");
        let cloud = Arc::new(SimulatedCloud::from_config(
            &config.failover,
            &config.simulation,
        ));
        Collaborators::from_cloud(cloud, notifications, metrics)
    } else {
        info!(
            regions = config.control_plane.endpoints.len(),
            "wiring http control plane"
        );
        let cloud = Arc::new(HttpControlPlane::new(&config.control_plane)?);
        Collaborators::from_cloud(cloud, notifications, metrics)
    };

    Ok(DisasterRecoveryOrchestrator::new(
        config.failover.clone(),
        config.metrics.namespace.clone(),
        collaborators,
    ))
}
