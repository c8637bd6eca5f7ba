//! ---
//! ops_section: "03-observability"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Outcome metric sinks."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use async_trait::async_trait;
use parking_lot::Mutex;
use r_ops_metrics::DisasterRecoveryMetrics;

use crate::providers::{
    CollaboratorError, CollaboratorResult, MetricDatum, MetricDimension, MetricSink, MetricUnit,
};

/// One emission captured by [`MemoryMetricSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub namespace: String,
    pub datum: MetricDatum,
    pub dimensions: Vec<MetricDimension>,
    pub duration: Option<MetricDatum>,
}

#[derive(Debug, Default)]
pub struct MemoryMetricSink {
    records: Mutex<Vec<MetricRecord>>,
}

impl MemoryMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MetricRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl MetricSink for MemoryMetricSink {
    async fn emit(
        &self,
        namespace: &str,
        datum: &MetricDatum,
        dimensions: &[MetricDimension],
        duration: Option<&MetricDatum>,
    ) -> CollaboratorResult<()> {
        self.records.lock().push(MetricRecord {
            namespace: namespace.to_owned(),
            datum: datum.clone(),
            dimensions: dimensions.to_vec(),
            duration: duration.cloned(),
        });
        Ok(())
    }
}

/// Feeds outcome metrics into the Prometheus registry served at `/metrics`.
///
/// The `Environment` dimension becomes the `environment` label; counts
/// increment the events counter and durations are observed on the histogram.
#[derive(Clone)]
pub struct PrometheusMetricSink {
    metrics: DisasterRecoveryMetrics,
}

impl PrometheusMetricSink {
    pub fn new(metrics: DisasterRecoveryMetrics) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl MetricSink for PrometheusMetricSink {
    async fn emit(
        &self,
        namespace: &str,
        datum: &MetricDatum,
        dimensions: &[MetricDimension],
        duration: Option<&MetricDatum>,
    ) -> CollaboratorResult<()> {
        let environment = dimensions
            .iter()
            .find(|dimension| dimension.name.eq_ignore_ascii_case("environment"))
            .map(|dimension| dimension.value.as_str())
            .unwrap_or("");

        if datum.unit != MetricUnit::Count || datum.value < 0.0 {
            return Err(CollaboratorError::Rejected(format!(
                "metric {} must be a non-negative count",
                datum.name
            )));
        }
        self.metrics
            .record_event(namespace, &datum.name, environment, datum.value.round() as u64);
        if let Some(duration) = duration {
            self.metrics
                .observe_duration(namespace, environment, duration.value.max(0.0));
        }
        Ok(())
    }
}
