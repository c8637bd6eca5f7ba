//! ---
//! ops_section: "03-observability"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Metrics collection and export utilities."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Bind `addr` synchronously so callers learn about port conflicts before spawning.
pub fn bind_listener(addr: SocketAddr, purpose: &str) -> Result<(TcpListener, SocketAddr)> {
    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind {purpose} listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .with_context(|| format!("failed to make {purpose} listener non-blocking"))?;
    let bound = listener.local_addr()?;
    Ok((TcpListener::from_std(listener)?, bound))
}

/// A router served on a background task until [`ServedRouter::shutdown`].
#[derive(Debug)]
pub struct ServedRouter {
    name: &'static str,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ServedRouter {
    /// Bind `addr` and serve `router` on it.
    pub fn spawn(name: &'static str, router: Router, addr: SocketAddr) -> Result<Self> {
        let (listener, bound) = bind_listener(addr, name)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            info!(server = name, address = %bound, "listening");
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|err| {
                    error!(server = name, address = %bound, error = %err, "server exited with error");
                    anyhow::Error::new(err).context(format!("{name} server failed"))
                })
        });
        Ok(Self {
            name,
            addr: bound,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// Address actually bound; differs from the request when port 0 was asked for.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let name = self.name;
        self.task
            .await
            .with_context(|| format!("{name} server task panicked"))?
    }
}

/// Render every family in the Prometheus text exposition format.
pub fn encode(registry: &Registry) -> Result<String> {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("failed to encode metrics")
}

async fn scrape(State(registry): State<SharedRegistry>) -> Response {
    match encode(&registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "metrics scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error").into_response()
        }
    }
}

/// Serve `registry` at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<ServedRouter> {
    let router = Router::new()
        .route("/metrics", get(scrape))
        .with_state(registry);
    ServedRouter::spawn("metrics", router, addr)
}

/// Metric families recorded for every disaster-recovery invocation.
#[derive(Clone)]
pub struct DisasterRecoveryMetrics {
    registry: SharedRegistry,
    events_total: IntCounterVec,
    duration_seconds: HistogramVec,
}

impl DisasterRecoveryMetrics {
    /// Register the disaster-recovery metric families against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let events_total = IntCounterVec::new(
            Opts::new(
                "r_ops_dr_events_total",
                "Disaster-recovery outcomes by metric name (success, failure, error)",
            ),
            &["namespace", "metric", "environment"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        // Failovers span seconds to tens of minutes.
        let buckets = prometheus::exponential_buckets(0.5, 2.0, 14)
            .context("failed to construct histogram buckets")?;
        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "r_ops_dr_duration_seconds",
                "Wall-clock duration of disaster-recovery invocations",
            )
            .buckets(buckets),
            &["namespace", "environment"],
        )?;
        registry.register(Box::new(duration_seconds.clone()))?;

        Ok(Self {
            registry,
            events_total,
            duration_seconds,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Add `count` to the counter for the named outcome metric.
    pub fn record_event(&self, namespace: &str, metric: &str, environment: &str, count: u64) {
        self.events_total
            .with_label_values(&[namespace, metric, environment])
            .inc_by(count);
    }

    /// Observe the duration of one invocation.
    pub fn observe_duration(&self, namespace: &str, environment: &str, seconds: f64) {
        self.duration_seconds
            .with_label_values(&[namespace, environment])
            .observe(seconds);
    }
}

impl std::fmt::Debug for DisasterRecoveryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisasterRecoveryMetrics").finish_non_exhaustive()
    }
}

pub use prometheus;
