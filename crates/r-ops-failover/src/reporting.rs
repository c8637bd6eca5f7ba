//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Response envelope construction, operator alerts and outcome metrics."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Turns the conclusion of one invocation into a [`ResponseEnvelope`] and fans
//! out the matching notification and metric.
//!
//! Alerting and metrics are best effort: a failing (or panicking) sink is
//! logged and never changes the envelope returned to the caller.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use r_ops_logging::{log_dr_event, ops_error, ops_info, ops_warn, DrEventOutcome, LogContext};

use crate::guard::contain;
use crate::model::{
    EnvelopePayload, FailoverResult, FailoverStep, ReadinessReport, RegionStatus,
    ResponseEnvelope, Severity, TerminalState, VerificationResult,
};
use crate::providers::{MetricDatum, MetricDimension, MetricSink, NotificationSink};
use crate::sequencer::FailoverPlan;

pub const HEALTHY_MESSAGE: &str = "Primary region healthy, no failover needed";
pub const SUBJECT_SUCCESS: &str = "DR SUCCESS";
pub const SUBJECT_FAILED: &str = "DR FAILED";
pub const SUBJECT_ERROR: &str = "DR ERROR";

pub const METRIC_SUCCESS: &str = "DisasterRecoverySuccess";
pub const METRIC_FAILURE: &str = "DisasterRecoveryFailure";
pub const METRIC_ERROR: &str = "DisasterRecoveryError";
pub const METRIC_DURATION: &str = "DisasterRecoveryDuration";
pub const ENVIRONMENT_DIMENSION: &str = "Environment";

/// How an invocation ended, with everything observed on the way.
#[derive(Debug, Clone)]
pub enum Conclusion {
    PrimaryHealthy {
        primary: RegionStatus,
    },
    StandbyNotReady {
        primary: RegionStatus,
        readiness: ReadinessReport,
    },
    Completed {
        primary: RegionStatus,
        readiness: ReadinessReport,
        plan: FailoverPlan,
        failover: FailoverResult,
        verification: VerificationResult,
    },
    Errored {
        error: String,
    },
}

impl Conclusion {
    pub fn terminal_state(&self) -> TerminalState {
        match self {
            Conclusion::PrimaryHealthy { .. } => TerminalState::AbortedHealthy,
            Conclusion::StandbyNotReady { .. } => TerminalState::AbortedNotReady,
            Conclusion::Completed {
                failover,
                verification,
                ..
            } => {
                if failover.success() && verification.success {
                    TerminalState::CompletedSuccess
                } else {
                    TerminalState::CompletedFailure
                }
            }
            Conclusion::Errored { .. } => TerminalState::Errored,
        }
    }
}

/// Alert plus metric fan-out for one invocation outcome.
struct Dispatch {
    severity: Severity,
    subject: &'static str,
    metric: Option<&'static str>,
}

/// Builds envelopes and emits the side effects attached to each terminal state.
#[derive(Clone)]
pub struct Reporter {
    environment: String,
    namespace: String,
    topic: Option<String>,
    notifications: Arc<dyn NotificationSink>,
    metrics: Arc<dyn MetricSink>,
}

impl Reporter {
    pub fn new(
        environment: impl Into<String>,
        namespace: impl Into<String>,
        topic: Option<String>,
        notifications: Arc<dyn NotificationSink>,
        metrics: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            environment: environment.into(),
            namespace: namespace.into(),
            topic: topic.filter(|topic| !topic.trim().is_empty()),
            notifications,
            metrics,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Publish an alert. Without a topic the alert is only logged.
    pub async fn notify(&self, severity: Severity, subject: &str, body: &str) {
        let ctx = LogContext::new().with_environment(&self.environment);
        let Some(topic) = self.topic.as_deref() else {
            ops_info!(
                context = ctx,
                "no notification topic configured, would send [{}] {}: {}",
                severity,
                subject,
                body
            );
            return;
        };

        let tagged = format!("[{}] {}", severity, subject);
        match contain(self.notifications.publish(topic, &tagged, severity, body)).await {
            Ok(Ok(())) => ops_info!(context = ctx, "notification sent: {}", tagged),
            Ok(Err(err)) => ops_error!(context = ctx, "failed to send notification: {}", err),
            Err(panic) => ops_error!(context = ctx, "notification sink panicked: {}", panic),
        }
    }

    /// Emit a count datum tagged with the environment, plus an optional duration datum.
    pub async fn record_metric(&self, name: &str, value: f64, duration_seconds: Option<f64>) {
        let ctx = LogContext::new().with_environment(&self.environment);
        let datum = MetricDatum::count(name, value);
        let duration = duration_seconds.map(|seconds| MetricDatum::seconds(METRIC_DURATION, seconds));
        let dimensions = [MetricDimension::new(
            ENVIRONMENT_DIMENSION,
            self.environment.as_str(),
        )];
        match contain(
            self.metrics
                .emit(&self.namespace, &datum, &dimensions, duration.as_ref()),
        )
        .await
        {
            Ok(Ok(())) => ops_info!(context = ctx, "metric sent: {} = {}", name, value),
            Ok(Err(err)) => ops_error!(context = ctx, "failed to send metric: {}", err),
            Err(panic) => ops_error!(context = ctx, "metric sink panicked: {}", panic),
        }
    }

    /// Build the single envelope for this invocation and fire its alert and metric.
    ///
    /// `started` is the instant taken when the request was received.
    pub async fn finalize(&self, started: Instant, conclusion: Conclusion) -> ResponseEnvelope {
        let outcome = conclusion.terminal_state();
        let elapsed = started.elapsed().as_secs_f64();
        let mut payload = EnvelopePayload::default();

        let (message, dispatch) = match conclusion {
            Conclusion::PrimaryHealthy { primary } => {
                payload.primary_status = Some(primary);
                (HEALTHY_MESSAGE.to_owned(), None)
            }
            Conclusion::StandbyNotReady { primary, readiness } => {
                let message = not_ready_message(&readiness);
                payload.primary_status = Some(primary);
                payload.standby_readiness = Some(readiness);
                (
                    message,
                    Some(Dispatch {
                        severity: Severity::Critical,
                        subject: SUBJECT_FAILED,
                        metric: None,
                    }),
                )
            }
            Conclusion::Completed {
                primary,
                readiness,
                plan,
                failover,
                verification,
            } => {
                let (message, dispatch) = if outcome == TerminalState::CompletedSuccess {
                    payload.failover_time_seconds = Some(elapsed);
                    payload.new_active_region = Some(plan.standby_region.clone());
                    (
                        success_message(elapsed, &plan, &failover),
                        Dispatch {
                            severity: Severity::Info,
                            subject: SUBJECT_SUCCESS,
                            metric: Some(METRIC_SUCCESS),
                        },
                    )
                } else {
                    (
                        failure_message(&failover, &verification),
                        Dispatch {
                            severity: Severity::Critical,
                            subject: SUBJECT_FAILED,
                            metric: Some(METRIC_FAILURE),
                        },
                    )
                };
                payload.primary_status = Some(primary);
                payload.standby_readiness = Some(readiness);
                payload.failover_results = Some(failover);
                payload.verification_results = Some(verification);
                (message, Some(dispatch))
            }
            Conclusion::Errored { error } => (
                format!("DISASTER RECOVERY ERROR: {}", error),
                Some(Dispatch {
                    severity: Severity::Critical,
                    subject: SUBJECT_ERROR,
                    metric: Some(METRIC_ERROR),
                }),
            ),
        };

        if let Some(dispatch) = dispatch {
            self.notify(dispatch.severity, dispatch.subject, &message).await;
            if let Some(metric) = dispatch.metric {
                self.record_metric(metric, 1.0, Some(elapsed)).await;
            }
        }

        let ctx = LogContext::new().with_environment(&self.environment);
        let event_outcome = if outcome.status_code() == 200 {
            DrEventOutcome::Success
        } else {
            DrEventOutcome::Fault
        };
        log_dr_event(
            Some(&ctx),
            &format!("dr.{}", outcome.as_str()),
            &message,
            event_outcome,
        );
        if outcome == TerminalState::Errored {
            ops_warn!(context = ctx, "invocation errored after {:.3}s", elapsed);
        }

        ResponseEnvelope {
            status_code: outcome.status_code(),
            outcome,
            message,
            timestamp: Utc::now(),
            duration_seconds: started.elapsed().as_secs_f64(),
            environment: self.environment.clone(),
            payload,
        }
    }
}

fn not_ready_message(readiness: &ReadinessReport) -> String {
    let issues = serde_json::to_string(readiness.issues())
        .unwrap_or_else(|_| readiness.issues().join(", "));
    format!("Standby region not ready: {}", issues)
}

fn success_message(elapsed: f64, plan: &FailoverPlan, failover: &FailoverResult) -> String {
    let mut message = format!(
        "DISASTER RECOVERY COMPLETED\nTime: {:.1} seconds\nStatus: Active region switched to {}\nRDS: {} promoted",
        elapsed, plan.standby_region, plan.standby_database
    );
    if failover.step(FailoverStep::DnsUpdate).is_some() {
        message.push_str("\nDNS: Updated to standby endpoints");
    }
    message
}

fn failure_message(failover: &FailoverResult, verification: &VerificationResult) -> String {
    let failover = serde_json::to_string(failover).unwrap_or_else(|err| err.to_string());
    let verification = serde_json::to_string(verification).unwrap_or_else(|err| err.to_string());
    format!(
        "DISASTER RECOVERY FAILED\nFailover: {}\nVerification: {}",
        failover, verification
    )
}
