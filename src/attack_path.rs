//! Attack Path Simulator
//!
//! Holds the latest simulation only. Each request supersedes the previous
//! result and error; a response that arrives after a newer request was
//! issued is dropped.

use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{NodeId, SimulationRequest};
use crate::state::StateCell;

pub const DEFAULT_ENTRY_NODE: &str = "endpoint-1";
pub const DEFAULT_TARGET_NODE: &str = "db-2";
pub const DEFAULT_HINT: &str = "data exfil";

/// What-if query: can an attacker get from any entry node to any target?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackPathQuery {
    pub entry_nodes: IndexSet<NodeId>,
    pub targets: IndexSet<NodeId>,
    /// Free-text hint for the vector search, e.g. "data exfil"
    pub hint: String,
}

impl Default for AttackPathQuery {
    fn default() -> Self {
        Self::new([DEFAULT_ENTRY_NODE], [DEFAULT_TARGET_NODE], DEFAULT_HINT)
    }
}

impl AttackPathQuery {
    pub fn new<E, T>(
        entry_nodes: impl IntoIterator<Item = E>,
        targets: impl IntoIterator<Item = T>,
        hint: &str,
    ) -> Self
    where
        E: Into<NodeId>,
        T: Into<NodeId>,
    {
        Self {
            entry_nodes: entry_nodes.into_iter().map(Into::into).collect(),
            targets: targets.into_iter().map(Into::into).collect(),
            hint: hint.to_string(),
        }
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.entry_nodes.is_empty() {
            return Err(ConsoleError::Validation("at least one entry node is required".to_string()));
        }
        if self.targets.is_empty() {
            return Err(ConsoleError::Validation("at least one target node is required".to_string()));
        }
        if let Some(blank) = self
            .entry_nodes
            .iter()
            .chain(self.targets.iter())
            .find(|id| id.as_str().trim().is_empty())
        {
            return Err(ConsoleError::Validation(format!("blank node id '{}'", blank)));
        }
        Ok(())
    }

    pub fn to_request(&self) -> SimulationRequest {
        SimulationRequest {
            entry_nodes: self.entry_nodes.iter().cloned().collect(),
            targets: self.targets.iter().cloned().collect(),
            query: self.hint.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SimulationState {
    #[default]
    Idle,
    Running(AttackPathQuery),
    Completed {
        query: AttackPathQuery,
        result: Arc<Value>,
    },
    Failed {
        query: AttackPathQuery,
        error: ConsoleError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Completed(Arc<Value>),
    /// A newer simulation was issued before this one returned
    Superseded,
}

/// Published simulation panel state
#[derive(Debug, Clone, Default)]
pub struct SimulationView {
    pub state: SimulationState,
    latest: u64,
}

pub struct AttackPathSimulator {
    backend: Arc<dyn Backend>,
    track: StateCell<SimulationView>,
}

impl AttackPathSimulator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            track: StateCell::default(),
        }
    }

    pub fn state(&self) -> SimulationState {
        self.track.get().state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<SimulationView> {
        self.track.subscribe()
    }

    /// Run a simulation. Invalid queries are rejected before any request and
    /// leave the held state untouched.
    pub async fn simulate(&self, query: AttackPathQuery) -> ConsoleResult<SimulationOutcome> {
        query.validate()?;
        let request = query.to_request();

        let seq = self.track.update(|track| {
            track.latest += 1;
            track.state = SimulationState::Running(query.clone());
            track.latest
        });

        info!(
            "Simulating attack paths {:?} -> {:?}",
            request.entry_nodes, request.targets
        );
        let result = self.backend.simulate_attack_path(&request).await.map(Arc::new);

        let latest = self.track.update_if(|track| {
            if track.latest != seq {
                return false;
            }
            track.state = match &result {
                Ok(value) => SimulationState::Completed {
                    query: query.clone(),
                    result: Arc::clone(value),
                },
                Err(error) => SimulationState::Failed {
                    query: query.clone(),
                    error: error.clone(),
                },
            };
            true
        });

        if !latest {
            debug!("Dropping superseded simulation #{}", seq);
            return Ok(SimulationOutcome::Superseded);
        }
        match result {
            Ok(value) => Ok(SimulationOutcome::Completed(value)),
            Err(e) => {
                warn!("Attack path simulation failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use serde_json::json;

    #[test]
    fn test_default_query() {
        let query = AttackPathQuery::default();
        assert!(query.validate().is_ok());
        assert_eq!(
            query.to_request(),
            SimulationRequest {
                entry_nodes: vec![NodeId::from("endpoint-1")],
                targets: vec![NodeId::from("db-2")],
                query: "data exfil".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_nodes_collapse() {
        let query = AttackPathQuery::new(["a", "a", "b"], ["db-2"], "");
        assert_eq!(query.entry_nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_sets_rejected_without_request() {
        let backend = Arc::new(ScriptedBackend::new());
        let simulator = AttackPathSimulator::new(backend.clone());

        let no_entry = AttackPathQuery::new(Vec::<NodeId>::new(), ["db-2"], "x");
        assert!(matches!(simulator.simulate(no_entry).await, Err(ConsoleError::Validation(_))));

        let no_target = AttackPathQuery::new(["endpoint-1"], Vec::<NodeId>::new(), "x");
        assert!(matches!(simulator.simulate(no_target).await, Err(ConsoleError::Validation(_))));

        let blank = AttackPathQuery::new(["  "], ["db-2"], "x");
        assert!(matches!(simulator.simulate(blank).await, Err(ConsoleError::Validation(_))));

        assert_eq!(backend.calls("simulate"), 0);
        assert_eq!(simulator.state(), SimulationState::Idle);
    }

    #[tokio::test]
    async fn test_each_call_supersedes_previous_result() {
        let backend = Arc::new(ScriptedBackend::new());
        let simulator = AttackPathSimulator::new(backend.clone());

        backend.set_simulation(Err(ConsoleError::Backend("no path".into())));
        assert!(simulator.simulate(AttackPathQuery::default()).await.is_err());
        assert!(matches!(simulator.state(), SimulationState::Failed { .. }));

        backend.set_simulation(Ok(json!({"paths": [["endpoint-1", "db-2"]]})));
        simulator.simulate(AttackPathQuery::default()).await.unwrap();
        match simulator.state() {
            SimulationState::Completed { result, .. } => {
                assert_eq!(*result, json!({"paths": [["endpoint-1", "db-2"]]}));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(backend.simulations_seen().len(), 2);
    }

    #[tokio::test]
    async fn test_late_response_is_superseded() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.hold("simulate");
        let simulator = Arc::new(AttackPathSimulator::new(backend.clone()));

        let slow = {
            let simulator = Arc::clone(&simulator);
            tokio::spawn(async move { simulator.simulate(AttackPathQuery::new(["web-3"], ["db-2"], "slow")).await })
        };
        backend.wait_entered("simulate").await;

        let fast = {
            let simulator = Arc::clone(&simulator);
            tokio::spawn(async move { simulator.simulate(AttackPathQuery::default()).await })
        };
        backend.wait_entered("simulate").await;

        backend.release("simulate");
        backend.release("simulate");

        assert_eq!(slow.await.unwrap(), Ok(SimulationOutcome::Superseded));
        assert!(matches!(fast.await.unwrap(), Ok(SimulationOutcome::Completed(_))));
        match simulator.state() {
            SimulationState::Completed { query, .. } => assert_eq!(query, AttackPathQuery::default()),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
