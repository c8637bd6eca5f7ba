//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Failover orchestration value types."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Invocation-scoped value types produced while handling one failover request.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Database lifecycle states under which the primary still counts as serving.
pub const HEALTHY_PRIMARY_STATES: [&str; 2] = ["available", "backing-up"];
/// The only database state a standby may be in to take over.
pub const DATABASE_AVAILABLE: &str = "available";
/// Lifecycle state reported by a compute endpoint that can accept invocations.
pub const COMPUTE_ACTIVE: &str = "Active";

const DEFAULT_SOURCE: &str = "manual";

fn default_source() -> String {
    DEFAULT_SOURCE.to_owned()
}

/// Action requested by the triggering event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailoverAction {
    /// Fail over only if the primary is actually impaired.
    #[default]
    InitiateFailover,
    /// Any other operator-defined action; skips the primary health gate.
    Custom(String),
}

impl FailoverAction {
    pub const INITIATE_FAILOVER: &'static str = "initiate_failover";

    pub fn as_str(&self) -> &str {
        match self {
            FailoverAction::InitiateFailover => Self::INITIATE_FAILOVER,
            FailoverAction::Custom(action) => action,
        }
    }
}

impl From<String> for FailoverAction {
    fn from(value: String) -> Self {
        if value == Self::INITIATE_FAILOVER {
            FailoverAction::InitiateFailover
        } else {
            FailoverAction::Custom(value)
        }
    }
}

impl From<&str> for FailoverAction {
    fn from(value: &str) -> Self {
        FailoverAction::from(value.to_owned())
    }
}

impl From<FailoverAction> for String {
    fn from(value: FailoverAction) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for FailoverAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Triggering event for one orchestrator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverRequest {
    #[serde(default)]
    pub action: FailoverAction,
    /// Free-text origin tag such as `manual` or `alarm`.
    #[serde(default = "default_source")]
    pub source: String,
}

impl FailoverRequest {
    pub fn new(action: impl Into<FailoverAction>, source: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            source: source.into(),
        }
    }

    /// Shorthand for an `initiate_failover` request from `source`.
    pub fn initiate(source: impl Into<String>) -> Self {
        Self::new(FailoverAction::InitiateFailover, source)
    }
}

impl Default for FailoverRequest {
    fn default() -> Self {
        Self::initiate(DEFAULT_SOURCE)
    }
}

/// Point-in-time health of one region's database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionStatus {
    pub healthy: bool,
    /// Reported lifecycle state; empty when the probe itself failed.
    pub status_detail: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegionStatus {
    pub fn observed(region: impl Into<String>, state: impl Into<String>, healthy: bool) -> Self {
        Self {
            healthy,
            status_detail: state.into(),
            region: region.into(),
            error: None,
        }
    }

    pub fn unreachable(region: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status_detail: String::new(),
            region: region.into(),
            error: Some(error.into()),
        }
    }
}

/// Standby eligibility. `ready` is derived from `issues` and cannot disagree with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    ready: bool,
    issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_status: Option<String>,
    region: String,
}

impl ReadinessReport {
    pub fn new(
        region: impl Into<String>,
        database_status: Option<String>,
        issues: Vec<String>,
    ) -> Self {
        Self {
            ready: issues.is_empty(),
            issues,
            database_status,
            region: region.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Blocking reasons in evaluation order.
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn database_status(&self) -> Option<&str> {
        self.database_status.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// The fixed remediation steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailoverStep {
    DnsUpdate,
    RdsPreparation,
    LambdaWarmup,
}

impl FailoverStep {
    /// Key under which the step outcome is recorded.
    pub fn key(&self) -> &'static str {
        match self {
            FailoverStep::DnsUpdate => "dns_update",
            FailoverStep::RdsPreparation => "rds_preparation",
            FailoverStep::LambdaWarmup => "lambda_warmup",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailoverStep::DnsUpdate => "DNS update",
            FailoverStep::RdsPreparation => "RDS preparation",
            FailoverStep::LambdaWarmup => "Lambda warmup",
        }
    }

    /// Action recorded when the step fails before producing its own.
    pub fn attempted_action(&self) -> &'static str {
        match self {
            FailoverStep::DnsUpdate => "update_dns",
            FailoverStep::RdsPreparation => "prepare_database",
            FailoverStep::LambdaWarmup => "warm_up",
        }
    }
}

impl fmt::Display for FailoverStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of one remediation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub success: bool,
    pub action: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub details: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(action: impl Into<String>) -> Self {
        Self {
            success: true,
            action: action.into(),
            details: IndexMap::new(),
            error: None,
        }
    }

    pub fn failed(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.into(),
            details: IndexMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Aggregate of every step executed by the sequencer.
///
/// Once any recorded step fails, `success` stays false for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailoverResult {
    success: bool,
    steps: IndexMap<String, StepOutcome>,
    errors: Vec<String>,
}

impl FailoverResult {
    pub fn new() -> Self {
        Self {
            success: true,
            steps: IndexMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, step: FailoverStep, outcome: StepOutcome) {
        if !outcome.success {
            self.success = false;
            self.errors.push(format!(
                "{} failed: {}",
                step.label(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        self.steps.insert(step.key().to_owned(), outcome);
    }

    /// Mark the whole sequence failed for a reason outside any single step.
    pub fn abort(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Step outcomes in execution order.
    pub fn steps(&self) -> &IndexMap<String, StepOutcome> {
        &self.steps
    }

    pub fn step(&self, step: FailoverStep) -> Option<&StepOutcome> {
        self.steps.get(step.key())
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Default for FailoverResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Independent post-sequence confirmation that the standby serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_status: Option<String>,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Alert severity attached to notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal states of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    AbortedHealthy,
    AbortedNotReady,
    CompletedSuccess,
    CompletedFailure,
    Errored,
}

impl TerminalState {
    /// 200 for no-failover-needed or success, 500 for everything else.
    pub fn status_code(&self) -> u16 {
        match self {
            TerminalState::AbortedHealthy | TerminalState::CompletedSuccess => 200,
            TerminalState::AbortedNotReady
            | TerminalState::CompletedFailure
            | TerminalState::Errored => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::AbortedHealthy => "aborted_healthy",
            TerminalState::AbortedNotReady => "aborted_not_ready",
            TerminalState::CompletedSuccess => "completed_success",
            TerminalState::CompletedFailure => "completed_failure",
            TerminalState::Errored => "errored",
        }
    }
}

/// Structured fields attached to a response; absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvelopePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_active_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_status: Option<RegionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standby_readiness: Option<ReadinessReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_results: Option<FailoverResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_results: Option<VerificationResult>,
}

/// Final output of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub outcome: TerminalState,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub environment: String,
    #[serde(flatten)]
    pub payload: EnvelopePayload,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
