//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "integration-tests"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "End-to-end failover scenarios against the in-memory control plane."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use r_ops_common::{DnsConfig, FailoverConfig};
use r_ops_failover::adapters::{MemoryMetricSink, MemoryNotificationSink, SimulatedCloud};
use r_ops_failover::{
    CollaboratorError, CollaboratorResult, Collaborators, DatabaseStatusProvider,
    DisasterRecoveryOrchestrator, FailoverRequest, FailoverStep, Severity, TerminalState,
};

const PRIMARY: &str = "us-east-1";
const STANDBY: &str = "us-west-2";
const NAMESPACE: &str = "Project3/DisasterRecovery";

struct Harness {
    cloud: Arc<SimulatedCloud>,
    notes: Arc<MemoryNotificationSink>,
    metrics: Arc<MemoryMetricSink>,
    orchestrator: DisasterRecoveryOrchestrator,
}

fn failover_config(dns: bool) -> FailoverConfig {
    FailoverConfig {
        environment: "staging".into(),
        primary_database: "primary-db".into(),
        standby_database: "standby-db".into(),
        standby_compute: "standby-api".into(),
        dns: dns.then(|| DnsConfig {
            zone_id: "Z123".into(),
            record_name: "api".into(),
        }),
        notification_topic: Some("dr-alerts".into()),
        ..FailoverConfig::default()
    }
}

/// Primary failed, standby fully ready: the happy failover path.
fn harness(config: FailoverConfig) -> Harness {
    let cloud = Arc::new(SimulatedCloud::new());
    cloud.set_database_state(PRIMARY, "primary-db", "failed");
    cloud.set_database_state(STANDBY, "standby-db", "available");
    cloud.set_endpoint_state(STANDBY, "standby-api", "Active");
    cloud.set_invoke_status(STANDBY, "standby-api", 200);
    with_cloud(config, cloud)
}

fn with_cloud(config: FailoverConfig, cloud: Arc<SimulatedCloud>) -> Harness {
    let notes = Arc::new(MemoryNotificationSink::new());
    let metrics = Arc::new(MemoryMetricSink::new());
    let orchestrator = DisasterRecoveryOrchestrator::new(
        config,
        NAMESPACE,
        Collaborators::from_cloud(cloud.clone(), notes.clone(), metrics.clone()),
    );
    Harness {
        cloud,
        notes,
        metrics,
        orchestrator,
    }
}

#[tokio::test]
async fn healthy_primary_aborts_without_side_effects() {
    let h = harness(failover_config(true));
    h.cloud.set_database_state(PRIMARY, "primary-db", "available");

    let envelope = h.orchestrator.handle(&FailoverRequest::initiate("alarm")).await;

    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.outcome, TerminalState::AbortedHealthy);
    assert!(envelope.message.contains("healthy"));
    assert_eq!(h.cloud.database_queries(), 1);
    assert_eq!(h.cloud.endpoint_queries(), 0);
    assert!(h.cloud.only_probed());
    assert!(h.notes.notifications().is_empty());
    assert!(h.metrics.records().is_empty());
    assert!(envelope.payload.failover_results.is_none());
}

#[tokio::test]
async fn backing_up_primary_still_counts_as_healthy() {
    let h = harness(failover_config(false));
    h.cloud.set_database_state(PRIMARY, "primary-db", "backing-up");
    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;
    assert_eq!(envelope.outcome, TerminalState::AbortedHealthy);
}

#[tokio::test]
async fn standby_issues_block_every_step() {
    let h = harness(failover_config(true));
    h.cloud.set_database_state(STANDBY, "standby-db", "stopped");
    h.cloud.set_endpoint_state(STANDBY, "standby-api", "Inactive");

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    assert_eq!(envelope.outcome, TerminalState::AbortedNotReady);
    assert!(h.cloud.only_probed());
    let readiness = envelope.payload.standby_readiness.as_ref().unwrap();
    assert_eq!(
        readiness.issues(),
        ["RDS status: stopped", "Lambda not active: Inactive"]
    );

    let sent = h.notes.notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Critical);
    for issue in readiness.issues() {
        assert!(sent[0].body.contains(issue.as_str()));
    }
}

#[tokio::test]
async fn no_dns_zone_means_no_dns_step() {
    let h = harness(failover_config(false));
    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 200);
    let failover = envelope.payload.failover_results.as_ref().unwrap();
    assert!(failover.success());
    assert!(failover.step(FailoverStep::DnsUpdate).is_none());
    assert_eq!(h.cloud.repoints(), 0);
    assert!(!envelope.message.contains("DNS:"));
}

#[tokio::test]
async fn promotion_failure_still_warms_up_compute() {
    let h = harness(failover_config(true));
    // Ready at assessment, degraded by the time the sequencer looks again.
    h.cloud.script_database(
        STANDBY,
        "standby-db",
        [Ok("available".to_owned()), Ok("modifying".to_owned())],
    );
    h.cloud.fail_promotion(
        STANDBY,
        "standby-db",
        CollaboratorError::Rejected("instance is rebooting".into()),
    );

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    let failover = envelope.payload.failover_results.as_ref().unwrap();
    assert!(!failover.success());
    let rds = failover.step(FailoverStep::RdsPreparation).unwrap();
    assert!(!rds.success);
    let warmup = failover.step(FailoverStep::LambdaWarmup).unwrap();
    assert!(warmup.success);
    assert_eq!(h.cloud.invocations(), 1);
}

#[tokio::test]
async fn repeated_preparation_of_available_database_is_a_no_op() {
    let h = harness(failover_config(false));
    for _ in 0..2 {
        let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;
        let failover = envelope.payload.failover_results.as_ref().unwrap();
        let rds = failover.step(FailoverStep::RdsPreparation).unwrap();
        assert!(rds.success);
        assert_eq!(rds.action, "already_ready");
    }
    assert_eq!(h.cloud.promotion_requests(), 0);
}

#[tokio::test]
async fn failed_verification_fails_the_invocation() {
    let h = harness(failover_config(true));
    // assessment, sequencer preparation, then verification
    h.cloud.script_database(
        STANDBY,
        "standby-db",
        [
            Ok("available".to_owned()),
            Ok("available".to_owned()),
            Ok("storage-full".to_owned()),
        ],
    );

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    assert_eq!(envelope.outcome, TerminalState::CompletedFailure);
    assert!(envelope.payload.failover_results.as_ref().unwrap().success());
    let verification = envelope.payload.verification_results.as_ref().unwrap();
    assert!(!verification.success);
    assert_eq!(verification.database_status.as_deref(), Some("storage-full"));
    assert_eq!(h.metrics.records()[0].datum.name, "DisasterRecoveryFailure");
}

struct SlowDatabases {
    inner: Arc<SimulatedCloud>,
    delay: Duration,
}

#[async_trait]
impl DatabaseStatusProvider for SlowDatabases {
    async fn instance_state(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        tokio::time::sleep(self.delay).await;
        self.inner.instance_state(region, id).await
    }
}

#[tokio::test]
async fn duration_tracks_wall_clock() {
    let h = harness(failover_config(false));
    let mut collaborators = Collaborators::from_cloud(
        h.cloud.clone(),
        h.notes.clone(),
        h.metrics.clone(),
    );
    collaborators.databases = Arc::new(SlowDatabases {
        inner: h.cloud.clone(),
        delay: Duration::from_millis(40),
    });
    let orchestrator =
        DisasterRecoveryOrchestrator::new(failover_config(false), NAMESPACE, collaborators);

    let started = Instant::now();
    let envelope = orchestrator.handle(&FailoverRequest::default()).await;
    let measured = started.elapsed().as_secs_f64();

    // primary, standby, preparation and verification probes
    assert!(envelope.duration_seconds >= 0.16);
    assert!(envelope.duration_seconds <= measured);
    let recorded = h.metrics.records();
    let duration = recorded[0].duration.as_ref().unwrap();
    assert!(duration.value > 0.0 && duration.value <= measured);
}

#[tokio::test]
async fn scenario_full_failover_succeeds() {
    let h = harness(failover_config(true));

    let envelope = h.orchestrator.handle(&FailoverRequest::initiate("alarm")).await;

    assert_eq!(envelope.status_code, 200);
    assert_eq!(envelope.outcome, TerminalState::CompletedSuccess);
    assert_eq!(envelope.environment, "staging");
    assert_eq!(envelope.payload.new_active_region.as_deref(), Some(STANDBY));
    assert!(envelope.payload.failover_time_seconds.is_some());
    assert!(envelope.message.contains("Active region switched to us-west-2"));
    assert!(envelope.message.contains("DNS: Updated to standby endpoints"));
    assert_eq!(h.cloud.routed_region("Z123", "api").as_deref(), Some(STANDBY));

    let failover = envelope.payload.failover_results.as_ref().unwrap();
    let keys: Vec<_> = failover.steps().keys().cloned().collect();
    assert_eq!(keys, ["dns_update", "rds_preparation", "lambda_warmup"]);

    let sent = h.notes.notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, Severity::Info);
    assert_eq!(sent[0].subject, "[INFO] DR SUCCESS");

    let recorded = h.metrics.records();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].namespace, NAMESPACE);
    assert_eq!(recorded[0].datum.name, "DisasterRecoverySuccess");
    assert_eq!(recorded[0].datum.value, 1.0);
    assert_eq!(
        recorded[0].duration.as_ref().unwrap().name,
        "DisasterRecoveryDuration"
    );
}

#[tokio::test]
async fn scenario_creating_standby_is_not_ready() {
    let h = harness(failover_config(true));
    h.cloud.set_database_state(STANDBY, "standby-db", "creating");

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    let readiness = envelope.payload.standby_readiness.as_ref().unwrap();
    assert_eq!(readiness.issues(), ["RDS status: creating"]);
    assert!(envelope.payload.failover_results.is_none());
    assert_eq!(h.cloud.repoints(), 0);
    assert_eq!(h.notes.count(Severity::Critical), 1);
    assert!(h.notes.notifications()[0].body.contains("RDS status: creating"));
}

#[tokio::test]
async fn scenario_dns_failure_fails_despite_other_steps() {
    let h = harness(failover_config(true));
    h.cloud
        .fail_repoint(CollaboratorError::Rejected("throttling: rate exceeded".into()));

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    let failover = envelope.payload.failover_results.as_ref().unwrap();
    assert!(!failover.step(FailoverStep::DnsUpdate).unwrap().success);
    assert!(failover.step(FailoverStep::RdsPreparation).unwrap().success);
    assert!(failover.step(FailoverStep::LambdaWarmup).unwrap().success);
    assert_eq!(
        failover.errors(),
        ["DNS update failed: request rejected: throttling: rate exceeded"]
    );
    assert!(envelope.payload.verification_results.as_ref().unwrap().success);
    assert_eq!(h.notes.count(Severity::Critical), 1);
}

struct PanickingDatabases;

#[async_trait]
impl DatabaseStatusProvider for PanickingDatabases {
    async fn instance_state(&self, _region: &str, _id: &str) -> CollaboratorResult<String> {
        panic!("database client poisoned");
    }
}

#[tokio::test]
async fn panic_during_assessment_ends_errored() {
    let h = harness(failover_config(true));
    let mut collaborators =
        Collaborators::from_cloud(h.cloud.clone(), h.notes.clone(), h.metrics.clone());
    collaborators.databases = Arc::new(PanickingDatabases);
    let orchestrator =
        DisasterRecoveryOrchestrator::new(failover_config(true), NAMESPACE, collaborators);

    let envelope = orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    assert_eq!(envelope.outcome, TerminalState::Errored);
    assert_eq!(
        envelope.message,
        "DISASTER RECOVERY ERROR: database client poisoned"
    );
    let sent = h.notes.notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[CRITICAL] DR ERROR");
    assert_eq!(h.metrics.records()[0].datum.name, "DisasterRecoveryError");
}

#[tokio::test]
async fn missing_topic_logs_notifications() {
    let mut config = failover_config(false);
    config.notification_topic = None;
    let h = harness(config);
    h.cloud.set_database_state(STANDBY, "standby-db", "creating");

    let envelope = h.orchestrator.handle(&FailoverRequest::default()).await;

    assert_eq!(envelope.status_code, 500);
    assert!(h.notes.notifications().is_empty());
}

#[tokio::test]
async fn envelope_serialises_original_contract() {
    let h = harness(failover_config(true));
    let envelope = h
        .orchestrator
        .handle_json(serde_json::json!({ "source": "manual" }))
        .await;
    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["statusCode"], 200);
    assert_eq!(value["new_active_region"], STANDBY);
    assert_eq!(
        value["failover_results"]["steps"]["lambda_warmup"]["action"],
        "warmed_up"
    );
    assert!(value["timestamp"].as_str().unwrap().contains('T'));
    assert!(value["duration_seconds"].as_f64().unwrap() >= 0.0);
}
