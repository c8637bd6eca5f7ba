//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "REST control-plane client implementing the cloud collaborators."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! JSON-over-HTTP client for a per-region control plane.
//!
//! | operation            | request                                   | response                 |
//! |----------------------|-------------------------------------------|--------------------------|
//! | database state       | `GET  /databases/{id}`                    | `{"status": "..."}`      |
//! | ensure serving       | `POST /databases/{id}/serve`              | `{"status": "..."}`      |
//! | endpoint state       | `GET  /functions/{id}`                    | `{"state": "..."}`       |
//! | invoke               | `POST /functions/{id}/invoke` (payload)   | `{"status_code": 200}`   |
//! | repoint record       | `PUT  /zones/{zone}/records/{record}`     | any 2xx                  |

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use indexmap::IndexMap;
use r_ops_common::ControlPlaneConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::providers::{
    CollaboratorError, CollaboratorResult, ComputeInvoker, ComputeStatusProvider,
    DatabasePromotionController, DatabaseStatusProvider, TrafficRouter,
};

#[derive(Deserialize)]
struct DatabaseBody {
    status: String,
}

#[derive(Deserialize)]
struct FunctionBody {
    state: String,
}

#[derive(Deserialize)]
struct InvokeBody {
    status_code: u16,
}

/// Identifies the resource behind a request for `NotFound` mapping.
struct Target<'a> {
    kind: &'static str,
    region: &'a str,
    id: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    endpoints: IndexMap<String, Url>,
    dns_endpoint: Option<Url>,
    timeout: Duration,
}

impl HttpControlPlane {
    pub fn new(config: &ControlPlaneConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build control-plane http client")?;
        let endpoints = config
            .endpoints
            .iter()
            .map(|(region, raw)| {
                let url = Url::parse(raw)
                    .with_context(|| format!("invalid control-plane endpoint for {region}: {raw}"))?;
                Ok((region.clone(), url))
            })
            .collect::<anyhow::Result<_>>()?;
        let dns_endpoint = config
            .dns_endpoint
            .as_deref()
            .map(|raw| Url::parse(raw).with_context(|| format!("invalid dns endpoint: {raw}")))
            .transpose()?;
        Ok(Self {
            client,
            endpoints,
            dns_endpoint,
            timeout: config.request_timeout,
        })
    }

    fn base_url(&self, region: &str) -> CollaboratorResult<&Url> {
        self.endpoints.get(region).ok_or_else(|| {
            CollaboratorError::Rejected(format!("no control-plane endpoint for region {region}"))
        })
    }

    /// `base` plus `segments`, each percent-encoded as a single path segment.
    fn resource_url(base: &Url, segments: &[&str]) -> CollaboratorResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| CollaboratorError::Rejected(format!("endpoint {base} cannot carry a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, target: Target<'_>) -> CollaboratorResult<Response> {
        let response = request.send().await.map_err(|err| self.transport_error(err))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound {
                kind: target.kind,
                region: target.region.to_owned(),
                id: target.id.to_owned(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Rejected(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body.trim()
        )))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> CollaboratorResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| CollaboratorError::UnexpectedResponse(err.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> CollaboratorError {
        if err.is_timeout() {
            CollaboratorError::Timeout(self.timeout)
        } else {
            CollaboratorError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl DatabaseStatusProvider for HttpControlPlane {
    async fn instance_state(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let url = Self::resource_url(self.base_url(region)?, &["databases", id])?;
        debug!(%url, "probing database state");
        let target = Target {
            kind: "database",
            region,
            id,
        };
        let response = self.send(self.client.get(url), target).await?;
        let body: DatabaseBody = self.decode(response).await?;
        Ok(body.status)
    }
}

#[async_trait]
impl DatabasePromotionController for HttpControlPlane {
    async fn ensure_serving(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let url = Self::resource_url(self.base_url(region)?, &["databases", id, "serve"])?;
        let target = Target {
            kind: "database",
            region,
            id,
        };
        let response = self.send(self.client.post(url), target).await?;
        let body: DatabaseBody = self.decode(response).await?;
        Ok(body.status)
    }
}

#[async_trait]
impl ComputeStatusProvider for HttpControlPlane {
    async fn endpoint_state(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let url = Self::resource_url(self.base_url(region)?, &["functions", id])?;
        let target = Target {
            kind: "function",
            region,
            id,
        };
        let response = self.send(self.client.get(url), target).await?;
        let body: FunctionBody = self.decode(response).await?;
        Ok(body.state)
    }
}

#[async_trait]
impl ComputeInvoker for HttpControlPlane {
    async fn invoke(&self, region: &str, id: &str, payload: &Value) -> CollaboratorResult<u16> {
        let url = Self::resource_url(self.base_url(region)?, &["functions", id, "invoke"])?;
        let target = Target {
            kind: "function",
            region,
            id,
        };
        let response = self
            .send(self.client.post(url).json(payload), target)
            .await?;
        let body: InvokeBody = self.decode(response).await?;
        Ok(body.status_code)
    }
}

#[async_trait]
impl TrafficRouter for HttpControlPlane {
    async fn repoint(
        &self,
        zone_id: &str,
        record_name: &str,
        target_region: &str,
    ) -> CollaboratorResult<()> {
        let base = match &self.dns_endpoint {
            Some(url) => url,
            None => self.base_url(target_region)?,
        };
        let url = Self::resource_url(base, &["zones", zone_id, "records", record_name])?;
        let target = Target {
            kind: "record",
            region: target_region,
            id: record_name,
        };
        self.send(
            self.client
                .put(url)
                .json(&json!({ "target_region": target_region })),
            target,
        )
        .await?;
        Ok(())
    }
}
