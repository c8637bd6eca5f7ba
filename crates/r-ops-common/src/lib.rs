//! ---
//! ops_section: "01-core-functionality"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Shared primitives and utilities for the operations runtime."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Core shared primitives for the R-OPS workspace.
//! This crate exposes configuration loading and tracing bootstrap
//! utilities consumed by the failover orchestrator and the daemon.

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, ControlPlaneConfig, DnsConfig, FailoverConfig, LoadedAppConfig,
    LoggingConfig, MetricsConfig, Mode, SimulationConfig,
};
pub use logging::{console_filter, init_tracing, LogFormat, LogRotation};
