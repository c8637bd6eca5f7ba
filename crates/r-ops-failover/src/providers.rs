//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Collaborator interfaces consumed by the orchestrator."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Narrow interfaces to the cloud control plane and the alerting backends.
//!
//! Implementations are constructed by the host and injected into the
//! orchestrator; none of them hold per-invocation state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::model::Severity;

/// Errors reported by any collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{kind} '{id}' not found in {region}")]
    NotFound {
        kind: &'static str,
        region: String,
        id: String,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Reports database lifecycle state (`available`, `backing-up`, `failed`, ...).
#[async_trait]
pub trait DatabaseStatusProvider: Send + Sync {
    async fn instance_state(&self, region: &str, id: &str) -> CollaboratorResult<String>;
}

/// Brings a standby database into a serving state. Must be safe to repeat.
#[async_trait]
pub trait DatabasePromotionController: Send + Sync {
    /// Returns the state observed after the request was accepted.
    async fn ensure_serving(&self, region: &str, id: &str) -> CollaboratorResult<String>;
}

/// Reports compute endpoint lifecycle state (`Active`, `Pending`, ...).
#[async_trait]
pub trait ComputeStatusProvider: Send + Sync {
    async fn endpoint_state(&self, region: &str, id: &str) -> CollaboratorResult<String>;
}

/// Synchronous request/response invocation of a compute endpoint.
#[async_trait]
pub trait ComputeInvoker: Send + Sync {
    /// Returns the invocation status code (200 on a normal invocation).
    async fn invoke(&self, region: &str, id: &str, payload: &Value) -> CollaboratorResult<u16>;
}

/// Points a routable DNS record at a region's endpoint. Must be idempotent.
#[async_trait]
pub trait TrafficRouter: Send + Sync {
    async fn repoint(
        &self,
        zone_id: &str,
        record_name: &str,
        target_region: &str,
    ) -> CollaboratorResult<()>;
}

/// Delivers alerts to operators.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        severity: Severity,
        body: &str,
    ) -> CollaboratorResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricUnit {
    Count,
    Seconds,
}

/// One named metric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDatum {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
}

impl MetricDatum {
    pub fn count(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: MetricUnit::Count,
        }
    }

    pub fn seconds(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: MetricUnit::Seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricDimension {
    pub name: String,
    pub value: String,
}

impl MetricDimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Records outcome metrics, optionally paired with a duration datum.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn emit(
        &self,
        namespace: &str,
        datum: &MetricDatum,
        dimensions: &[MetricDimension],
        duration: Option<&MetricDatum>,
    ) -> CollaboratorResult<()>;
}

/// Every collaborator the orchestrator needs, as shared trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub databases: Arc<dyn DatabaseStatusProvider>,
    pub promotion: Arc<dyn DatabasePromotionController>,
    pub compute: Arc<dyn ComputeStatusProvider>,
    pub invoker: Arc<dyn ComputeInvoker>,
    pub router: Arc<dyn TrafficRouter>,
    pub notifications: Arc<dyn NotificationSink>,
    pub metrics: Arc<dyn MetricSink>,
}

impl Collaborators {
    /// Wire all five cloud-facing roles to a single control-plane implementation.
    pub fn from_cloud<C>(
        cloud: Arc<C>,
        notifications: Arc<dyn NotificationSink>,
        metrics: Arc<dyn MetricSink>,
    ) -> Self
    where
        C: DatabaseStatusProvider
            + DatabasePromotionController
            + ComputeStatusProvider
            + ComputeInvoker
            + TrafficRouter
            + 'static,
    {
        Self {
            databases: cloud.clone(),
            promotion: cloud.clone(),
            compute: cloud.clone(),
            invoker: cloud.clone(),
            router: cloud,
            notifications,
            metrics,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
