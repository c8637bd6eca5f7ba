//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "In-memory control plane used for drills and tests."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
//! Scriptable in-memory stand-in for every cloud-facing collaborator.
//!
//! Resource state is keyed by `(region, id)`. Each probe first drains any
//! scripted responses queued for the resource, then falls back to the steady
//! state. Every call is appended to an ordered log for assertions.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use r_ops_common::{FailoverConfig, SimulationConfig};
use serde_json::Value;

use crate::model::DATABASE_AVAILABLE;
use crate::providers::{
    CollaboratorError, CollaboratorResult, ComputeInvoker, ComputeStatusProvider,
    DatabasePromotionController, DatabaseStatusProvider, TrafficRouter,
};

type ResourceKey = (String, String);

fn key(region: &str, id: &str) -> ResourceKey {
    (region.to_owned(), id.to_owned())
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum CloudCall {
    DatabaseState {
        region: String,
        id: String,
    },
    EnsureServing {
        region: String,
        id: String,
    },
    EndpointState {
        region: String,
        id: String,
    },
    Invoke {
        region: String,
        id: String,
        payload: Value,
    },
    Repoint {
        zone_id: String,
        record_name: String,
        target_region: String,
    },
}

#[derive(Default)]
struct Scripted {
    queued: VecDeque<CollaboratorResult<String>>,
    steady: Option<CollaboratorResult<String>>,
}

impl Scripted {
    fn next(&mut self) -> Option<CollaboratorResult<String>> {
        self.queued.pop_front().or_else(|| self.steady.clone())
    }
}

struct State {
    databases: HashMap<ResourceKey, Scripted>,
    endpoints: HashMap<ResourceKey, Scripted>,
    invoke_results: HashMap<ResourceKey, CollaboratorResult<u16>>,
    promotion_failures: HashMap<ResourceKey, CollaboratorError>,
    repoint_failure: Option<CollaboratorError>,
    routes: HashMap<ResourceKey, String>,
    converge_on_promotion: bool,
    calls: Vec<CloudCall>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            databases: HashMap::new(),
            endpoints: HashMap::new(),
            invoke_results: HashMap::new(),
            promotion_failures: HashMap::new(),
            repoint_failure: None,
            routes: HashMap::new(),
            converge_on_promotion: true,
            calls: Vec::new(),
        }
    }
}

/// In-memory control plane. Unknown resources answer `NotFound`.
#[derive(Default)]
pub struct SimulatedCloud {
    state: Mutex<State>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the resources named in `failover` with the states from `simulation`.
    pub fn from_config(failover: &FailoverConfig, simulation: &SimulationConfig) -> Self {
        let cloud = Self::new();
        cloud.set_database_state(
            &failover.primary_region,
            &failover.primary_database,
            &simulation.primary_database_state,
        );
        cloud.set_database_state(
            &failover.standby_region,
            &failover.standby_database,
            &simulation.standby_database_state,
        );
        cloud.set_endpoint_state(
            &failover.standby_region,
            &failover.standby_compute,
            &simulation.standby_compute_state,
        );
        cloud.set_invoke_status(
            &failover.standby_region,
            &failover.standby_compute,
            simulation.warmup_status,
        );
        cloud
    }

    pub fn set_database_state(&self, region: &str, id: &str, state: &str) {
        let mut guard = self.state.lock();
        let entry = guard.databases.entry(key(region, id)).or_default();
        entry.queued.clear();
        entry.steady = Some(Ok(state.to_owned()));
    }

    pub fn fail_database(&self, region: &str, id: &str, error: CollaboratorError) {
        let mut guard = self.state.lock();
        let entry = guard.databases.entry(key(region, id)).or_default();
        entry.queued.clear();
        entry.steady = Some(Err(error));
    }

    /// Queue one-shot database probe answers served before the steady state.
    pub fn script_database<I>(&self, region: &str, id: &str, responses: I)
    where
        I: IntoIterator<Item = CollaboratorResult<String>>,
    {
        let mut guard = self.state.lock();
        guard
            .databases
            .entry(key(region, id))
            .or_default()
            .queued
            .extend(responses);
    }

    pub fn set_endpoint_state(&self, region: &str, id: &str, state: &str) {
        let mut guard = self.state.lock();
        let entry = guard.endpoints.entry(key(region, id)).or_default();
        entry.queued.clear();
        entry.steady = Some(Ok(state.to_owned()));
    }

    pub fn fail_endpoint(&self, region: &str, id: &str, error: CollaboratorError) {
        let mut guard = self.state.lock();
        let entry = guard.endpoints.entry(key(region, id)).or_default();
        entry.queued.clear();
        entry.steady = Some(Err(error));
    }

    pub fn set_invoke_status(&self, region: &str, id: &str, status: u16) {
        self.state
            .lock()
            .invoke_results
            .insert(key(region, id), Ok(status));
    }

    pub fn fail_invoke(&self, region: &str, id: &str, error: CollaboratorError) {
        self.state
            .lock()
            .invoke_results
            .insert(key(region, id), Err(error));
    }

    pub fn fail_promotion(&self, region: &str, id: &str, error: CollaboratorError) {
        self.state
            .lock()
            .promotion_failures
            .insert(key(region, id), error);
    }

    /// Every subsequent repoint fails with `error`.
    pub fn fail_repoint(&self, error: CollaboratorError) {
        self.state.lock().repoint_failure = Some(error);
    }

    /// When set (the default) a successful promotion leaves the database `available`.
    pub fn set_converge_on_promotion(&self, converge: bool) {
        self.state.lock().converge_on_promotion = converge;
    }

    /// Region a record currently points at, if it was ever repointed.
    pub fn routed_region(&self, zone_id: &str, record_name: &str) -> Option<String> {
        self.state
            .lock()
            .routes
            .get(&key(zone_id, record_name))
            .cloned()
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.state.lock().calls.clone()
    }

    pub fn database_queries(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::DatabaseState { .. }))
    }

    pub fn endpoint_queries(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::EndpointState { .. }))
    }

    pub fn promotion_requests(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::EnsureServing { .. }))
    }

    pub fn invocations(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::Invoke { .. }))
    }

    pub fn repoints(&self) -> usize {
        self.count(|call| matches!(call, CloudCall::Repoint { .. }))
    }

    /// True when nothing but read-only probes were issued.
    pub fn only_probed(&self) -> bool {
        self.promotion_requests() == 0 && self.invocations() == 0 && self.repoints() == 0
    }

    fn count(&self, predicate: impl Fn(&CloudCall) -> bool) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

#[async_trait]
impl DatabaseStatusProvider for SimulatedCloud {
    async fn instance_state(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let mut guard = self.state.lock();
        guard.calls.push(CloudCall::DatabaseState {
            region: region.to_owned(),
            id: id.to_owned(),
        });
        guard
            .databases
            .get_mut(&key(region, id))
            .and_then(Scripted::next)
            .unwrap_or_else(|| {
                Err(CollaboratorError::NotFound {
                    kind: "database",
                    region: region.to_owned(),
                    id: id.to_owned(),
                })
            })
    }
}

#[async_trait]
impl DatabasePromotionController for SimulatedCloud {
    async fn ensure_serving(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let mut guard = self.state.lock();
        guard.calls.push(CloudCall::EnsureServing {
            region: region.to_owned(),
            id: id.to_owned(),
        });
        let resource = key(region, id);
        if let Some(error) = guard.promotion_failures.get(&resource) {
            return Err(error.clone());
        }
        let converge = guard.converge_on_promotion;
        let Some(entry) = guard.databases.get_mut(&resource) else {
            return Err(CollaboratorError::NotFound {
                kind: "database",
                region: region.to_owned(),
                id: id.to_owned(),
            });
        };
        if converge {
            entry.queued.clear();
            entry.steady = Some(Ok(DATABASE_AVAILABLE.to_owned()));
        }
        match &entry.steady {
            Some(Ok(state)) => Ok(state.clone()),
            Some(Err(err)) => Err(err.clone()),
            None => Err(CollaboratorError::UnexpectedResponse(format!(
                "database '{id}' has no recorded state"
            ))),
        }
    }
}

#[async_trait]
impl ComputeStatusProvider for SimulatedCloud {
    async fn endpoint_state(&self, region: &str, id: &str) -> CollaboratorResult<String> {
        let mut guard = self.state.lock();
        guard.calls.push(CloudCall::EndpointState {
            region: region.to_owned(),
            id: id.to_owned(),
        });
        guard
            .endpoints
            .get_mut(&key(region, id))
            .and_then(Scripted::next)
            .unwrap_or_else(|| {
                Err(CollaboratorError::NotFound {
                    kind: "function",
                    region: region.to_owned(),
                    id: id.to_owned(),
                })
            })
    }
}

#[async_trait]
impl ComputeInvoker for SimulatedCloud {
    async fn invoke(&self, region: &str, id: &str, payload: &Value) -> CollaboratorResult<u16> {
        let mut guard = self.state.lock();
        guard.calls.push(CloudCall::Invoke {
            region: region.to_owned(),
            id: id.to_owned(),
            payload: payload.clone(),
        });
        let resource = key(region, id);
        if let Some(result) = guard.invoke_results.get(&resource) {
            return result.clone();
        }
        if guard.endpoints.contains_key(&resource) {
            Ok(200)
        } else {
            Err(CollaboratorError::NotFound {
                kind: "function",
                region: region.to_owned(),
                id: id.to_owned(),
            })
        }
    }
}

#[async_trait]
impl TrafficRouter for SimulatedCloud {
    async fn repoint(
        &self,
        zone_id: &str,
        record_name: &str,
        target_region: &str,
    ) -> CollaboratorResult<()> {
        let mut guard = self.state.lock();
        guard.calls.push(CloudCall::Repoint {
            zone_id: zone_id.to_owned(),
            record_name: record_name.to_owned(),
            target_region: target_region.to_owned(),
        });
        if let Some(error) = &guard.repoint_failure {
            return Err(error.clone());
        }
        guard
            .routes
            .insert(key(zone_id, record_name), target_region.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_answers_precede_steady_state() {
        let cloud = SimulatedCloud::new();
        cloud.set_database_state("us-west-2", "db", "available");
        cloud.script_database(
            "us-west-2",
            "db",
            [
                Ok("modifying".to_owned()),
                Err(CollaboratorError::Transport("flaky".into())),
            ],
        );
        assert_eq!(cloud.instance_state("us-west-2", "db").await.unwrap(), "modifying");
        assert!(cloud.instance_state("us-west-2", "db").await.is_err());
        assert_eq!(cloud.instance_state("us-west-2", "db").await.unwrap(), "available");
        assert_eq!(cloud.database_queries(), 3);
    }

    #[tokio::test]
    async fn unknown_resources_are_not_found() {
        let cloud = SimulatedCloud::new();
        let err = cloud.endpoint_state("us-west-2", "missing").await.unwrap_err();
        assert_eq!(err.to_string(), "function 'missing' not found in us-west-2");
    }

    #[tokio::test]
    async fn promotion_converges_unless_disabled() {
        let cloud = SimulatedCloud::new();
        cloud.set_database_state("us-west-2", "db", "stopped");
        assert_eq!(cloud.ensure_serving("us-west-2", "db").await.unwrap(), "available");

        cloud.set_database_state("us-west-2", "db", "stopped");
        cloud.set_converge_on_promotion(false);
        assert_eq!(cloud.ensure_serving("us-west-2", "db").await.unwrap(), "stopped");
        assert_eq!(cloud.promotion_requests(), 2);
    }

    #[tokio::test]
    async fn repoint_tracks_routes() {
        let cloud = SimulatedCloud::new();
        cloud.repoint("Z1", "api", "us-west-2").await.unwrap();
        assert_eq!(cloud.routed_region("Z1", "api").as_deref(), Some("us-west-2"));

        cloud.fail_repoint(CollaboratorError::Rejected("throttled".into()));
        assert!(cloud.repoint("Z1", "api", "us-east-1").await.is_err());
        assert_eq!(cloud.routed_region("Z1", "api").as_deref(), Some("us-west-2"));
    }

    #[test]
    fn seeds_from_configuration() {
        let failover = FailoverConfig::default();
        let cloud = SimulatedCloud::from_config(&failover, &SimulationConfig::default());
        let state = cloud.state.lock();
        assert!(state
            .databases
            .contains_key(&key(&failover.primary_region, &failover.primary_database)));
        assert_eq!(
            state
                .invoke_results
                .get(&key(&failover.standby_region, &failover.standby_compute)),
            Some(&Ok(200))
        );
    }
}
