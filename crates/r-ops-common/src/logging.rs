//! ---
//! ops_section: "01-core-functionality"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Tracing bootstrap for the daemon: console stream plus failover audit file."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{EnvFilter, Targets};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "R_OPS_LOG";

/// Crates whose events belong in the failover audit trail.
const AUDIT_TARGETS: [&str; 2] = ["r_ops_failover", "r_ops_logging"];

struct WriterGuards {
    _console: WorkerGuard,
    _audit: WorkerGuard,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Console output format for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
    Compact,
}

/// How often the audit file rolls over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Console filter: `R_OPS_LOG`, then `RUST_LOG`, then `info`.
///
/// An unparsable `R_OPS_LOG` falls back to `info` rather than failing startup.
pub fn console_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive {directive:?} ({err}); using info");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// The audit file only ever sees failover decisions, at info and above.
fn audit_filter() -> Targets {
    AUDIT_TARGETS
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, Level::INFO)
        })
}

/// Install the global subscriber for long-running daemon processes.
///
/// Console events go to stdout in the configured format. Failover events are
/// additionally appended as JSON to `<directory>/<prefix>.audit.log`, rolled
/// per [`LoggingConfig::rotation`], for post-incident review.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "failed to create log directory {}",
            config.directory.display()
        )
    })?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);

    let audit_appender = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(prefix)
        .filename_suffix("audit.log")
        .build(&config.directory)
        .context("failed to open failover audit log")?;
    let (audit_writer, audit_guard) = tracing_appender::non_blocking(audit_appender);
    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set(WriterGuards {
        _console: console_guard,
        _audit: audit_guard,
    });

    let console = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(console_writer);
    let console = match config.format {
        LogFormat::StructuredJson => console.with_target(false).json().boxed(),
        LogFormat::Pretty => console.pretty().boxed(),
        LogFormat::Compact => console.compact().boxed(),
    };

    let audit = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_current_span(false)
        .with_writer(audit_writer)
        .with_filter(audit_filter());

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter()))
        .with(audit)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        audit_dir = %config.directory.display(),
        rotation = ?config.rotation,
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}
