//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Post-failover confirmation that the standby is serving."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::Utc;
use r_ops_logging::{ops_info, ops_warn, LogContext};

use crate::model::{VerificationResult, DATABASE_AVAILABLE};
use crate::providers::DatabaseStatusProvider;

/// Re-probes the standby database instead of trusting the sequencer's report.
#[derive(Clone)]
pub struct OutcomeVerifier {
    databases: Arc<dyn DatabaseStatusProvider>,
}

impl OutcomeVerifier {
    pub fn new(databases: Arc<dyn DatabaseStatusProvider>) -> Self {
        Self { databases }
    }

    pub async fn verify(&self, region: &str, db_id: &str) -> VerificationResult {
        let ctx = LogContext::new().with_region(region).with_resource(db_id);
        match self.databases.instance_state(region, db_id).await {
            Ok(state) => {
                let success = state == DATABASE_AVAILABLE;
                if success {
                    ops_info!(context = ctx, "standby database verified: {}", state);
                } else {
                    ops_warn!(context = ctx, "standby database not serving: {}", state);
                }
                VerificationResult {
                    success,
                    database_status: Some(state),
                    region: region.to_owned(),
                    error: None,
                    timestamp: Utc::now(),
                }
            }
            Err(err) => {
                ops_warn!(context = ctx, "verification probe failed: {}", err);
                VerificationResult {
                    success: false,
                    database_status: None,
                    region: region.to_owned(),
                    error: Some(err.to_string()),
                    timestamp: Utc::now(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedCloud;
    use crate::providers::CollaboratorError;

    #[tokio::test]
    async fn only_available_counts_as_serving() {
        let cloud = Arc::new(SimulatedCloud::new());
        let verifier = OutcomeVerifier::new(cloud.clone());

        cloud.set_database_state("us-west-2", "db", "available");
        let ok = verifier.verify("us-west-2", "db").await;
        assert!(ok.success);
        assert_eq!(ok.database_status.as_deref(), Some("available"));

        cloud.set_database_state("us-west-2", "db", "modifying");
        let pending = verifier.verify("us-west-2", "db").await;
        assert!(!pending.success);
        assert!(pending.error.is_none());
    }

    #[tokio::test]
    async fn probe_failure_is_captured() {
        let cloud = Arc::new(SimulatedCloud::new());
        cloud.fail_database(
            "us-west-2",
            "db",
            CollaboratorError::Transport("reset by peer".into()),
        );
        let result = OutcomeVerifier::new(cloud).verify("us-west-2", "db").await;
        assert!(!result.success);
        assert_eq!(result.region, "us-west-2");
        assert_eq!(result.error.as_deref(), Some("transport error: reset by peer"));
    }
}
