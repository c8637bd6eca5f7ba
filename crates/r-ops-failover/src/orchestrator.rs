//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Top-level failover state machine."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Drives one invocation through assessment, remediation, verification and
//! reporting.
//!
//! ```text
//! Start -> AbortedHealthy
//!       -> AbortedNotReady
//!       -> Executing -> Verifying -> CompletedSuccess | CompletedFailure
//! (any state) -> Errored
//! ```

use std::time::Instant;

use anyhow::bail;
use r_ops_common::FailoverConfig;
use r_ops_logging::{ops_info, ops_warn, LogContext};
use serde_json::Value;

use crate::guard::contain;
use crate::health::HealthAssessor;
use crate::model::{FailoverAction, FailoverRequest, ResponseEnvelope};
use crate::providers::Collaborators;
use crate::reporting::{Conclusion, Reporter};
use crate::sequencer::{DnsTarget, FailoverPlan, FailoverSequencer};
use crate::verifier::OutcomeVerifier;

/// Stateless between invocations; safe to share across tasks.
#[derive(Clone)]
pub struct DisasterRecoveryOrchestrator {
    config: FailoverConfig,
    assessor: HealthAssessor,
    sequencer: FailoverSequencer,
    verifier: OutcomeVerifier,
    reporter: Reporter,
}

impl DisasterRecoveryOrchestrator {
    pub fn new(
        config: FailoverConfig,
        metric_namespace: impl Into<String>,
        collaborators: Collaborators,
    ) -> Self {
        let Collaborators {
            databases,
            promotion,
            compute,
            invoker,
            router,
            notifications,
            metrics,
        } = collaborators;
        let reporter = Reporter::new(
            config.environment.clone(),
            metric_namespace,
            config.notification_topic.clone(),
            notifications,
            metrics,
        );
        Self {
            assessor: HealthAssessor::new(databases.clone(), compute),
            sequencer: FailoverSequencer::new(router, databases.clone(), promotion, invoker),
            verifier: OutcomeVerifier::new(databases),
            reporter,
            config,
        }
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn assessor(&self) -> &HealthAssessor {
        &self.assessor
    }

    /// Remediation plan derived from configuration.
    pub fn plan(&self) -> FailoverPlan {
        FailoverPlan {
            dns: self.config.dns.as_ref().map(|dns| DnsTarget {
                zone_id: dns.zone_id.clone(),
                record_name: dns.record_name.clone(),
            }),
            standby_region: self.config.standby_region.clone(),
            standby_database: self.config.standby_database.clone(),
            standby_compute: self.config.standby_compute.clone(),
        }
    }

    /// Handle one request. Never fails: every outcome, including panics, is an envelope.
    pub async fn handle(&self, request: &FailoverRequest) -> ResponseEnvelope {
        self.handle_from(Instant::now(), request).await
    }

    /// Handle a raw JSON event. A malformed event ends in the errored state.
    pub async fn handle_json(&self, event: Value) -> ResponseEnvelope {
        let started = Instant::now();
        match serde_json::from_value::<FailoverRequest>(event) {
            Ok(request) => self.handle_from(started, &request).await,
            Err(err) => {
                self.reporter
                    .finalize(
                        started,
                        Conclusion::Errored {
                            error: format!("invalid failover request: {}", err),
                        },
                    )
                    .await
            }
        }
    }

    async fn handle_from(&self, started: Instant, request: &FailoverRequest) -> ResponseEnvelope {
        let ctx = LogContext::new().with_environment(&self.config.environment);
        ops_info!(
            context = ctx,
            "disaster recovery requested: action={} source={}",
            request.action,
            request.source
        );

        let conclusion = match contain(self.run(request)).await {
            Ok(Ok(conclusion)) => conclusion,
            Ok(Err(err)) => Conclusion::Errored {
                error: format!("{:#}", err),
            },
            Err(panic) => Conclusion::Errored { error: panic },
        };
        self.reporter.finalize(started, conclusion).await
    }

    /// Walk the state machine up to its conclusion without reporting it.
    pub async fn run(&self, request: &FailoverRequest) -> anyhow::Result<Conclusion> {
        let config = &self.config;
        let primary = self
            .assessor
            .assess_primary(&config.primary_region, &config.primary_database)
            .await;
        let ctx = LogContext::new()
            .with_environment(&config.environment)
            .with_region(&config.primary_region);
        ops_info!(
            context = ctx,
            "primary region status: healthy={} state={}",
            primary.healthy,
            primary.status_detail
        );

        if request.action == FailoverAction::InitiateFailover && primary.healthy {
            ops_warn!(context = ctx, "primary region appears healthy, aborting failover");
            return Ok(Conclusion::PrimaryHealthy { primary });
        }

        if config.standby_database.trim().is_empty() || config.standby_compute.trim().is_empty() {
            bail!("standby database and compute identifiers must be configured");
        }

        let readiness = self
            .assessor
            .assess_standby_readiness(
                &config.standby_region,
                &config.standby_database,
                &config.standby_compute,
            )
            .await;
        if !readiness.is_ready() {
            return Ok(Conclusion::StandbyNotReady { primary, readiness });
        }

        let plan = self.plan();
        let failover = self.sequencer.execute_sequence(&plan).await;
        let verification = self
            .verifier
            .verify(&plan.standby_region, &plan.standby_database)
            .await;

        Ok(Conclusion::Completed {
            primary,
            readiness,
            plan,
            failover,
            verification,
        })
    }
}

impl std::fmt::Debug for DisasterRecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisasterRecoveryOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
