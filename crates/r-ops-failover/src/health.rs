//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Primary impairment and standby eligibility probes."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::sync::Arc;

use r_ops_logging::{ops_debug, ops_warn, LogContext};

use crate::model::{
    ReadinessReport, RegionStatus, COMPUTE_ACTIVE, DATABASE_AVAILABLE, HEALTHY_PRIMARY_STATES,
};
use crate::providers::{ComputeStatusProvider, DatabaseStatusProvider};

/// Read-only probes deciding whether a failover is needed and possible.
///
/// Probe failures are folded into the returned status; nothing here returns an error.
#[derive(Clone)]
pub struct HealthAssessor {
    databases: Arc<dyn DatabaseStatusProvider>,
    compute: Arc<dyn ComputeStatusProvider>,
}

impl HealthAssessor {
    pub fn new(
        databases: Arc<dyn DatabaseStatusProvider>,
        compute: Arc<dyn ComputeStatusProvider>,
    ) -> Self {
        Self { databases, compute }
    }

    /// Healthy iff the primary database reports `available` or `backing-up`.
    pub async fn assess_primary(&self, region: &str, db_id: &str) -> RegionStatus {
        let ctx = LogContext::new().with_region(region).with_resource(db_id);
        match self.databases.instance_state(region, db_id).await {
            Ok(state) => {
                let healthy = HEALTHY_PRIMARY_STATES.contains(&state.as_str());
                ops_debug!(context = ctx, "primary database state {} (healthy={})", state, healthy);
                RegionStatus::observed(region, state, healthy)
            }
            Err(err) => {
                ops_warn!(context = ctx, "cannot check primary region: {}", err);
                RegionStatus::unreachable(region, err.to_string())
            }
        }
    }

    /// Evaluates the database and compute checks independently so every
    /// simultaneous blocker is reported.
    pub async fn assess_standby_readiness(
        &self,
        region: &str,
        db_id: &str,
        compute_id: &str,
    ) -> ReadinessReport {
        let mut issues = Vec::new();

        let database_status = match self.databases.instance_state(region, db_id).await {
            Ok(state) => {
                if state != DATABASE_AVAILABLE {
                    issues.push(format!("RDS status: {}", state));
                }
                Some(state)
            }
            Err(err) => {
                issues.push(format!("RDS check failed: {}", err));
                None
            }
        };

        match self.compute.endpoint_state(region, compute_id).await {
            Ok(state) if state == COMPUTE_ACTIVE => {}
            Ok(state) => issues.push(format!("Lambda not active: {}", state)),
            Err(err) => issues.push(format!("Lambda check failed: {}", err)),
        }

        if !issues.is_empty() {
            let ctx = LogContext::new().with_region(region);
            ops_warn!(context = ctx, "standby not ready: {}", issues.join("; "));
        }
        ReadinessReport::new(region, database_status, issues)
    }
}
