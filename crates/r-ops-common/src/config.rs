//! ---
//! ops_section: "01-core-functionality"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Shared primitives and utilities for the operations runtime."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::{LogFormat, LogRotation};

fn default_mode() -> Mode {
    Mode::Production
}

fn default_environment() -> String {
    "development".to_owned()
}

fn default_primary_region() -> String {
    "us-east-1".to_owned()
}

fn default_standby_region() -> String {
    "us-west-2".to_owned()
}

fn default_record_name() -> String {
    "api".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_primary_database_state() -> String {
    "failed".to_owned()
}

fn default_standby_database_state() -> String {
    "available".to_owned()
}

fn default_standby_compute_state() -> String {
    "Active".to_owned()
}

fn default_warmup_status() -> u16 {
    200
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

fn default_metric_namespace() -> String {
    "Project3/DisasterRecovery".to_owned()
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Primary configuration object for the R-OPS runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// A parsed configuration and the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_OPS_CONFIG";

    /// See [`AppConfig::load_with_source`].
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Self::load_with_source(candidates).map(|loaded| loaded.config)
    }

    /// Resolve, parse and validate the configuration file.
    ///
    /// A non-blank `R_OPS_CONFIG` is authoritative and must exist. Otherwise the
    /// first existing candidate wins. Deployment overrides from the process
    /// environment are applied before validation.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        let pinned = std::env::var(Self::ENV_CONFIG_PATH)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let source = match pinned {
            Some(path) => path,
            None => candidates
                .iter()
                .map(|candidate| candidate.as_ref())
                .find(|candidate| candidate.is_file())
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    let inspected: Vec<String> = candidates
                        .iter()
                        .map(|candidate| candidate.as_ref().display().to_string())
                        .collect();
                    anyhow!(
                        "no configuration file found (set {} or create one of: {})",
                        Self::ENV_CONFIG_PATH,
                        inspected.join(", ")
                    )
                })?,
        };
        let config = Self::read_file(&source)?;
        Ok(LoadedAppConfig { config, source })
    }

    fn read_file(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "reading failover configuration");
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut config: AppConfig =
            toml::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))?;
        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("rejected {}", path.display()))?;
        Ok(config)
    }

    /// Apply the `R_OPS_*` deployment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply deployment overrides resolved through `lookup`.
    ///
    /// An empty `R_OPS_DNS_ZONE_ID` disables the DNS repoint step and an empty
    /// `R_OPS_NOTIFICATION_TOPIC` disables notification delivery.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let failover = &mut self.failover;
        if let Some(value) = lookup("R_OPS_ENVIRONMENT") {
            failover.environment = value;
        }
        if let Some(value) = lookup("R_OPS_PRIMARY_REGION") {
            failover.primary_region = value;
        }
        if let Some(value) = lookup("R_OPS_STANDBY_REGION") {
            failover.standby_region = value;
        }
        if let Some(value) = lookup("R_OPS_PRIMARY_DB") {
            failover.primary_database = value;
        }
        if let Some(value) = lookup("R_OPS_STANDBY_DB") {
            failover.standby_database = value;
        }
        if let Some(value) = lookup("R_OPS_STANDBY_COMPUTE") {
            failover.standby_compute = value;
        }
        if let Some(zone_id) = lookup("R_OPS_DNS_ZONE_ID") {
            failover.dns = if zone_id.trim().is_empty() {
                None
            } else {
                let record_name = failover
                    .dns
                    .take()
                    .map(|dns| dns.record_name)
                    .unwrap_or_else(default_record_name);
                Some(DnsConfig {
                    zone_id,
                    record_name,
                })
            };
        }
        if let Some(record_name) = lookup("R_OPS_DNS_RECORD_NAME") {
            if let Some(dns) = failover.dns.as_mut() {
                dns.record_name = record_name;
            }
        }
        if let Some(topic) = lookup("R_OPS_NOTIFICATION_TOPIC") {
            failover.notification_topic = if topic.trim().is_empty() {
                None
            } else {
                Some(topic)
            };
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.failover.validate()?;
        if self.mode == Mode::Production {
            for region in [
                &self.failover.primary_region,
                &self.failover.standby_region,
            ] {
                if !self.control_plane.endpoints.contains_key(region) {
                    bail!(
                        "control_plane.endpoints must declare an endpoint for region '{}'",
                        region
                    );
                }
            }
        }
        if self.metrics.namespace.trim().is_empty() {
            bail!("metrics.namespace must not be empty");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            failover: FailoverConfig::default(),
            control_plane: ControlPlaneConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operating mode for the daemon.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Simulation,
}

impl Mode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, Mode::Simulation)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Mode::Production),
            "simulation" => Ok(Mode::Simulation),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Addressing for the primary/standby pair handed to the failover orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Environment tag stamped on responses and metric dimensions.
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_primary_region")]
    pub primary_region: String,
    #[serde(default)]
    pub primary_database: String,
    #[serde(default = "default_standby_region")]
    pub standby_region: String,
    #[serde(default)]
    pub standby_database: String,
    #[serde(default)]
    pub standby_compute: String,
    /// When absent the DNS repoint step is skipped entirely.
    #[serde(default)]
    pub dns: Option<DnsConfig>,
    /// When absent or blank notifications are logged instead of delivered.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub notification_topic: Option<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|text| !text.trim().is_empty()))
}

impl FailoverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.primary_region == self.standby_region {
            bail!(
                "primary and standby regions must differ (both are '{}')",
                self.primary_region
            );
        }
        for (field, value) in [
            ("failover.primary_database", &self.primary_database),
            ("failover.standby_database", &self.standby_database),
            ("failover.standby_compute", &self.standby_compute),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", field);
            }
        }
        if let Some(dns) = &self.dns {
            if dns.zone_id.trim().is_empty() || dns.record_name.trim().is_empty() {
                bail!("failover.dns requires both zone_id and record_name");
            }
        }
        Ok(())
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            primary_region: default_primary_region(),
            primary_database: String::new(),
            standby_region: default_standby_region(),
            standby_database: String::new(),
            standby_compute: String::new(),
            dns: None,
            notification_topic: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsConfig {
    pub zone_id: String,
    #[serde(default = "default_record_name")]
    pub record_name: String,
}

/// Regional control-plane endpoints used by the HTTP collaborators.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base URL per region, e.g. `us-west-2 = "https://ops.us-west-2.internal"`.
    #[serde(default)]
    pub endpoints: IndexMap<String, String>,
    /// Global DNS API; falls back to the target region's endpoint.
    #[serde(default)]
    pub dns_endpoint: Option<String>,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoints: IndexMap::new(),
            dns_endpoint: None,
            request_timeout: default_request_timeout(),
            webhook_url: None,
        }
    }
}

/// Resource states seeded into the in-memory cloud used by drills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_primary_database_state")]
    pub primary_database_state: String,
    #[serde(default = "default_standby_database_state")]
    pub standby_database_state: String,
    #[serde(default = "default_standby_compute_state")]
    pub standby_compute_state: String,
    #[serde(default = "default_warmup_status")]
    pub warmup_status: u16,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            primary_database_state: default_primary_database_state(),
            standby_database_state: default_standby_database_state(),
            standby_compute_state: default_standby_compute_state(),
            warmup_status: default_warmup_status(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            rotation: LogRotation::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_metric_namespace")]
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
            namespace: default_metric_namespace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}
