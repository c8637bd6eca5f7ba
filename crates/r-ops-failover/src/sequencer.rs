//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Ordered remediation plan executed against the standby region."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::Utc;
use r_ops_logging::{ops_error, ops_info, LogContext};
use serde_json::{json, Value};

use crate::guard::contain;
use crate::model::{FailoverResult, FailoverStep, StepOutcome, DATABASE_AVAILABLE};
use crate::providers::{
    ComputeInvoker, DatabasePromotionController, DatabaseStatusProvider, TrafficRouter,
};

/// Origin tag carried in the warm-up payload so handlers can recognise it.
pub const WARMUP_SOURCE: &str = "disaster_recovery";

/// Payload sent to the standby compute endpoint to force initialisation.
pub fn warmup_payload() -> Value {
    json!({ "warmup": true, "source": WARMUP_SOURCE })
}

/// Routable record to repoint at the standby region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsTarget {
    pub zone_id: String,
    pub record_name: String,
}

/// Standby addressing for one sequence run. No DNS target, or a blank zone, means no DNS step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPlan {
    pub dns: Option<DnsTarget>,
    pub standby_region: String,
    pub standby_database: String,
    pub standby_compute: String,
}

/// Executes the fixed plan: DNS repoint, database readiness, compute warm-up.
///
/// Every configured step runs exactly once per call, whatever happened to the
/// steps before it.
#[derive(Clone)]
pub struct FailoverSequencer {
    router: Arc<dyn TrafficRouter>,
    databases: Arc<dyn DatabaseStatusProvider>,
    promotion: Arc<dyn DatabasePromotionController>,
    invoker: Arc<dyn ComputeInvoker>,
}

impl FailoverSequencer {
    pub fn new(
        router: Arc<dyn TrafficRouter>,
        databases: Arc<dyn DatabaseStatusProvider>,
        promotion: Arc<dyn DatabasePromotionController>,
        invoker: Arc<dyn ComputeInvoker>,
    ) -> Self {
        Self {
            router,
            databases,
            promotion,
            invoker,
        }
    }

    pub async fn execute_sequence(&self, plan: &FailoverPlan) -> FailoverResult {
        let mut result = FailoverResult::new();
        let completed = contain(self.run_steps(plan, &mut result)).await;
        if let Err(message) = completed {
            let ctx = LogContext::new().with_region(&plan.standby_region);
            ops_error!(context = ctx, "failover sequence aborted: {}", message);
            result.abort(format!("Failover sequence error: {}", message));
        }
        result
    }

    async fn run_steps(&self, plan: &FailoverPlan, result: &mut FailoverResult) {
        if let Some(dns) = plan.dns.as_ref().filter(|dns| !dns.zone_id.trim().is_empty()) {
            let outcome = self.update_dns(dns, &plan.standby_region).await;
            result.record(FailoverStep::DnsUpdate, outcome);
        }

        let outcome = self
            .prepare_standby_database(&plan.standby_region, &plan.standby_database)
            .await;
        result.record(FailoverStep::RdsPreparation, outcome);

        let outcome = self
            .warm_up_compute(&plan.standby_region, &plan.standby_compute)
            .await;
        result.record(FailoverStep::LambdaWarmup, outcome);
    }

    /// Point the record at the standby region. Runs first: propagation is the longest pole.
    pub async fn update_dns(&self, target: &DnsTarget, region: &str) -> StepOutcome {
        let step = FailoverStep::DnsUpdate;
        let ctx = LogContext::new()
            .with_region(region)
            .with_step(step.key())
            .with_resource(&target.record_name);
        ops_info!(context = ctx, "updating DNS: {} -> {}", target.record_name, region);
        match self
            .router
            .repoint(&target.zone_id, &target.record_name, region)
            .await
        {
            Ok(()) => StepOutcome::succeeded("dns_updated")
                .with_detail("record_name", target.record_name.clone())
                .with_detail("new_region", region)
                .with_detail("timestamp", Utc::now().to_rfc3339()),
            Err(err) => {
                ops_error!(context = ctx, "DNS update failed: {}", err);
                StepOutcome::failed(step.attempted_action(), err.to_string())
            }
        }
    }

    /// Idempotent: an `available` database is left alone and reported `already_ready`.
    pub async fn prepare_standby_database(&self, region: &str, db_id: &str) -> StepOutcome {
        let step = FailoverStep::RdsPreparation;
        let ctx = LogContext::new()
            .with_region(region)
            .with_step(step.key())
            .with_resource(db_id);
        let current = match self.databases.instance_state(region, db_id).await {
            Ok(state) => state,
            Err(err) => {
                ops_error!(context = ctx, "cannot read standby database state: {}", err);
                return StepOutcome::failed(step.attempted_action(), err.to_string());
            }
        };
        ops_info!(context = ctx, "standby database status: {}", current);

        if current == DATABASE_AVAILABLE {
            return StepOutcome::succeeded("already_ready").with_detail("status", current);
        }

        match self.promotion.ensure_serving(region, db_id).await {
            Ok(state) => StepOutcome::succeeded("prepared")
                .with_detail("previous_status", current)
                .with_detail("status", state),
            Err(err) => {
                ops_error!(context = ctx, "standby database promotion failed: {}", err);
                StepOutcome::failed(step.attempted_action(), err.to_string())
                    .with_detail("status", current)
            }
        }
    }

    /// Synchronous warm-up invocation; only a 200 status counts as success.
    pub async fn warm_up_compute(&self, region: &str, compute_id: &str) -> StepOutcome {
        let step = FailoverStep::LambdaWarmup;
        let ctx = LogContext::new()
            .with_region(region)
            .with_step(step.key())
            .with_resource(compute_id);
        ops_info!(context = ctx, "warming up standby compute endpoint");
        match self
            .invoker
            .invoke(region, compute_id, &warmup_payload())
            .await
        {
            Ok(200) => StepOutcome::succeeded("warmed_up").with_detail("status_code", 200),
            Ok(code) => {
                ops_error!(context = ctx, "warm-up returned status {}", code);
                StepOutcome::failed(
                    step.attempted_action(),
                    format!("Warmup failed with status: {}", code),
                )
                .with_detail("status_code", code)
            }
            Err(err) => {
                ops_error!(context = ctx, "warm-up invocation failed: {}", err);
                StepOutcome::failed(step.attempted_action(), err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::adapters::{CloudCall, SimulatedCloud};
    use crate::providers::{CollaboratorError, CollaboratorResult};

    const REGION: &str = "us-west-2";

    fn sequencer(cloud: &Arc<SimulatedCloud>) -> FailoverSequencer {
        FailoverSequencer::new(cloud.clone(), cloud.clone(), cloud.clone(), cloud.clone())
    }

    fn plan(dns: bool) -> FailoverPlan {
        FailoverPlan {
            dns: dns.then(|| DnsTarget {
                zone_id: "Z1".into(),
                record_name: "api".into(),
            }),
            standby_region: REGION.into(),
            standby_database: "db".into(),
            standby_compute: "fn".into(),
        }
    }

    fn ready_cloud() -> Arc<SimulatedCloud> {
        let cloud = Arc::new(SimulatedCloud::new());
        cloud.set_database_state(REGION, "db", "available");
        cloud.set_endpoint_state(REGION, "fn", "Active");
        cloud.set_invoke_status(REGION, "fn", 200);
        cloud
    }

    #[tokio::test]
    async fn runs_all_steps_in_order() {
        let cloud = ready_cloud();
        let result = sequencer(&cloud).execute_sequence(&plan(true)).await;
        assert!(result.success());
        let keys: Vec<_> = result.steps().keys().cloned().collect();
        assert_eq!(keys, ["dns_update", "rds_preparation", "lambda_warmup"]);
        assert_eq!(result.step(FailoverStep::DnsUpdate).unwrap().action, "dns_updated");
        assert_eq!(
            result.step(FailoverStep::LambdaWarmup).unwrap().action,
            "warmed_up"
        );

        let calls = cloud.calls();
        assert!(matches!(
            &calls[0],
            CloudCall::Repoint { zone_id, record_name, target_region }
                if zone_id == "Z1" && record_name == "api" && target_region == REGION
        ));
        assert!(calls.iter().any(|call| matches!(
            call,
            CloudCall::Invoke { payload, .. } if payload == &warmup_payload()
        )));
    }

    #[tokio::test]
    async fn skipped_dns_step_is_absent_and_not_a_failure() {
        let cloud = ready_cloud();
        let result = sequencer(&cloud).execute_sequence(&plan(false)).await;
        assert!(result.success());
        assert!(!result.steps().contains_key("dns_update"));
        assert_eq!(result.steps().len(), 2);
        assert!(!cloud
            .calls()
            .iter()
            .any(|call| matches!(call, CloudCall::Repoint { .. })));
    }

    #[tokio::test]
    async fn blank_zone_skips_dns_step() {
        let cloud = ready_cloud();
        let mut plan = plan(true);
        if let Some(dns) = plan.dns.as_mut() {
            dns.zone_id = " ".into();
        }
        let result = sequencer(&cloud).execute_sequence(&plan).await;
        assert!(result.success());
        assert!(!result.steps().contains_key("dns_update"));
        assert_eq!(cloud.repoints(), 0);
    }

    #[tokio::test]
    async fn promotion_failure_does_not_stop_warmup() {
        let cloud = ready_cloud();
        cloud.set_database_state(REGION, "db", "stopped");
        cloud.fail_promotion(REGION, "db", CollaboratorError::Rejected("quota".into()));
        let result = sequencer(&cloud).execute_sequence(&plan(false)).await;

        assert!(!result.success());
        let rds = result.step(FailoverStep::RdsPreparation).unwrap();
        assert!(!rds.success);
        assert_eq!(rds.error.as_deref(), Some("request rejected: quota"));
        let warmup = result.step(FailoverStep::LambdaWarmup).unwrap();
        assert!(warmup.success);
        assert_eq!(result.errors(), ["RDS preparation failed: request rejected: quota"]);
    }

    #[tokio::test]
    async fn promotion_is_idempotent_on_available_database() {
        let cloud = ready_cloud();
        let sequencer = sequencer(&cloud);
        for _ in 0..2 {
            let outcome = sequencer.prepare_standby_database(REGION, "db").await;
            assert!(outcome.success);
            assert_eq!(outcome.action, "already_ready");
            assert!(outcome.error.is_none());
        }
        assert_eq!(cloud.promotion_requests(), 0);
    }

    #[tokio::test]
    async fn unavailable_database_is_prepared() {
        let cloud = ready_cloud();
        cloud.set_database_state(REGION, "db", "stopped");
        let outcome = sequencer(&cloud)
            .prepare_standby_database(REGION, "db")
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.action, "prepared");
        assert_eq!(outcome.details["previous_status"], "stopped");
        assert_eq!(cloud.promotion_requests(), 1);
    }

    #[tokio::test]
    async fn non_200_warmup_fails_the_step() {
        let cloud = ready_cloud();
        cloud.set_invoke_status(REGION, "fn", 429);
        let outcome = sequencer(&cloud).warm_up_compute(REGION, "fn").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Warmup failed with status: 429")
        );
    }

    struct PanickingInvoker;

    #[async_trait]
    impl ComputeInvoker for PanickingInvoker {
        async fn invoke(&self, _region: &str, _id: &str, _payload: &Value) -> CollaboratorResult<u16> {
            panic!("invoker client poisoned");
        }
    }

    #[tokio::test]
    async fn panic_inside_sequence_becomes_failed_result() {
        let cloud = ready_cloud();
        let sequencer = FailoverSequencer::new(
            cloud.clone(),
            cloud.clone(),
            cloud.clone(),
            Arc::new(PanickingInvoker),
        );
        let result = sequencer.execute_sequence(&plan(true)).await;
        assert!(!result.success());
        assert!(result.steps().contains_key("rds_preparation"));
        assert_eq!(
            result.errors(),
            ["Failover sequence error: invoker client poisoned"]
        );
    }
}
