//! ---
//! ops_section: "03-observability"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Structured logging adapters and sinks."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the failover orchestrator and the daemon.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber writing to stderr.
///
/// Used by one-shot invocations whose stdout carries the response envelope.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Deployment environment tag.
    pub environment: Option<&'a str>,
    /// Region the event concerns.
    pub region: Option<&'a str>,
    /// Remediation step name, when the event is scoped to one.
    pub step: Option<&'a str>,
    /// Resource identifier (database, compute endpoint, DNS record).
    pub resource: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an environment tag.
    pub fn with_environment(mut self, environment: &'a str) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Attach a region.
    pub fn with_region(mut self, region: &'a str) -> Self {
        self.region = Some(region);
        self
    }

    /// Attach a remediation step name.
    pub fn with_step(mut self, step: &'a str) -> Self {
        self.step = Some(step);
        self
    }

    /// Attach a resource identifier.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrEventOutcome {
    /// The operation completed successfully or was a clean no-op.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl DrEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            DrEventOutcome::Success => "success",
            DrEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized disaster-recovery lifecycle event.
pub fn log_dr_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: DrEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    match outcome {
        DrEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            environment = ctx.environment.unwrap_or(""),
            region = ctx.region.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %message
        ),
        DrEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            environment = ctx.environment.unwrap_or(""),
            region = ctx.region.unwrap_or(""),
            step = ctx.step.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %message
        ),
    }
}
