//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Disaster-recovery failover orchestrator."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Region failover orchestration.
//!
//! One invocation checks whether the primary region is impaired, confirms the
//! standby can take over, repoints traffic and promotes the standby, verifies
//! the result independently and reports a single [`ResponseEnvelope`].
//!
//! All cloud and alerting effects go through the traits in [`providers`];
//! [`adapters`] holds the HTTP, webhook, Prometheus and in-memory
//! implementations.

pub mod adapters;
mod guard;
pub mod health;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod reporting;
pub mod sequencer;
pub mod verifier;

pub use health::HealthAssessor;
pub use model::{
    EnvelopePayload, FailoverAction, FailoverRequest, FailoverResult, FailoverStep,
    ReadinessReport, RegionStatus, ResponseEnvelope, Severity, StepOutcome, TerminalState,
    VerificationResult,
};
pub use orchestrator::DisasterRecoveryOrchestrator;
pub use providers::{
    CollaboratorError, CollaboratorResult, Collaborators, ComputeInvoker, ComputeStatusProvider,
    DatabasePromotionController, DatabaseStatusProvider, MetricDatum, MetricDimension,
    MetricSink, MetricUnit, NotificationSink, TrafficRouter,
};
pub use reporting::{Conclusion, Reporter};
pub use sequencer::{DnsTarget, FailoverPlan, FailoverSequencer};
pub use verifier::OutcomeVerifier;
