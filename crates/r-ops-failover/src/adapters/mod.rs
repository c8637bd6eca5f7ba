//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Concrete collaborator implementations."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Collaborator implementations the daemon wires into the orchestrator.

mod http;
mod metrics;
mod notify;
mod simulated;

pub use http::HttpControlPlane;
pub use metrics::{MemoryMetricSink, MetricRecord, PrometheusMetricSink};
pub use notify::{
    LogNotificationSink, MemoryNotificationSink, SentNotification, WebhookNotificationSink,
};
pub use simulated::{CloudCall, SimulatedCloud};
