//! ScriptedBackend: in-process backend for tests and offline demos
//!
//! Responses are scripted per operation and per incident. Any operation can be
//! held at a gate so tests can decide the order in which overlapping requests
//! complete.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use crate::backend::Backend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    GraphEdgePayload, GraphNodePayload, GraphPayload, HealthStatus, Incident, IncidentId, NodeId,
    SimulationRequest, StoryboardTimeline, TimelineEntry, ZeroDayScan,
};

struct Gate {
    entered: Notify,
    release: Semaphore,
    lifted: AtomicBool,
}

/// Backend whose answers are set up by the caller
#[derive(Default)]
pub struct ScriptedBackend {
    incidents: Mutex<Vec<Incident>>,
    list_failures: Mutex<VecDeque<ConsoleError>>,
    hunt_failure: Mutex<Option<ConsoleError>>,
    hunt_adds_incident: Mutex<bool>,
    graphs: Mutex<HashMap<IncidentId, ConsoleResult<GraphPayload>>>,
    analyses: Mutex<HashMap<IncidentId, ConsoleResult<Value>>>,
    simulation: Mutex<Option<ConsoleResult<Value>>>,
    simulations_seen: Mutex<Vec<SimulationRequest>>,
    reports: Mutex<HashMap<IncidentId, ConsoleResult<Bytes>>>,
    zero_day_status: Mutex<Option<String>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incident fixture with a generated description
    pub fn incident(id: &str, timestamp: f64) -> Incident {
        Incident {
            id: IncidentId::new(id),
            timestamp,
            description: format!("suspicious activity {}", id),
            source: Some("endpoint-1".to_string()),
            severity: Some(0.8),
            auto_remediated: false,
            remediation_notes: None,
        }
    }

    /// Graph fixture from node ids and `(from, to)` pairs
    pub fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> GraphPayload {
        GraphPayload {
            nodes: nodes
                .iter()
                .map(|id| GraphNodePayload { id: NodeId::from(*id), meta: Value::Null })
                .collect(),
            edges: edges
                .iter()
                .map(|(from, to)| GraphEdgePayload {
                    from: NodeId::from(*from),
                    to: NodeId::from(*to),
                    meta: Value::Null,
                })
                .collect(),
        }
    }

    /// Incidents in backend (ascending) order
    pub fn set_incidents(&self, incidents: Vec<Incident>) {
        *self.incidents.lock().unwrap() = incidents;
    }

    pub fn fail_next_list(&self, error: ConsoleError) {
        self.list_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_hunts(&self, error: ConsoleError) {
        *self.hunt_failure.lock().unwrap() = Some(error);
    }

    /// Make every accepted hunt append a new incident, like the real engine
    pub fn hunts_create_incidents(&self) {
        *self.hunt_adds_incident.lock().unwrap() = true;
    }

    pub fn set_graph(&self, incident: &str, graph: ConsoleResult<GraphPayload>) {
        self.graphs.lock().unwrap().insert(IncidentId::new(incident), graph);
    }

    pub fn set_analysis(&self, incident: &str, analysis: ConsoleResult<Value>) {
        self.analyses.lock().unwrap().insert(IncidentId::new(incident), analysis);
    }

    pub fn set_simulation(&self, result: ConsoleResult<Value>) {
        *self.simulation.lock().unwrap() = Some(result);
    }

    pub fn set_report(&self, incident: &str, report: ConsoleResult<Bytes>) {
        self.reports.lock().unwrap().insert(IncidentId::new(incident), report);
    }

    pub fn set_zero_day_status(&self, status: &str) {
        *self.zero_day_status.lock().unwrap() = Some(status.to_string());
    }

    /// Simulation requests received so far
    pub fn simulations_seen(&self) -> Vec<SimulationRequest> {
        self.simulations_seen.lock().unwrap().clone()
    }

    /// Number of calls received for an operation, e.g. `"fetch_graph"`
    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    /// Hold calls for `key` until [`ScriptedBackend::release`] is called.
    ///
    /// Keys are `"<operation>"` or `"<operation>:<incident>"`, e.g.
    /// `"fetch_graph:A"`, `"simulate"`.
    pub fn hold(&self, key: &str) {
        self.gates.lock().unwrap().insert(
            key.to_string(),
            Arc::new(Gate {
                entered: Notify::new(),
                release: Semaphore::new(0),
                lifted: AtomicBool::new(false),
            }),
        );
    }

    /// Let new calls for `key` pass straight through. Calls already held stay
    /// held until released.
    pub fn lift(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(key) {
            gate.lifted.store(true, Ordering::SeqCst);
        }
    }

    /// Let one held call for `key` complete
    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(key) {
            gate.release.add_permits(1);
        }
    }

    /// Wait until a call for a held `key` has arrived
    pub async fn wait_entered(&self, key: &str) {
        let gate = self.gates.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            gate.entered.notified().await;
        }
    }

    async fn enter(&self, operation: &'static str, incident: Option<&IncidentId>) {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;

        let key = match incident {
            Some(id) => format!("{}:{}", operation, id),
            None => operation.to_string(),
        };
        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate.filter(|g| !g.lifted.load(Ordering::SeqCst)) {
            gate.entered.notify_one();
            if let Ok(permit) = gate.release.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list_incidents(&self) -> ConsoleResult<Vec<Incident>> {
        self.enter("list_incidents", None).await;
        if let Some(error) = self.list_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.incidents.lock().unwrap().clone())
    }

    async fn trigger_hunt(&self) -> ConsoleResult<()> {
        self.enter("trigger_hunt", None).await;
        if let Some(error) = self.hunt_failure.lock().unwrap().clone() {
            return Err(error);
        }
        if *self.hunt_adds_incident.lock().unwrap() {
            let mut incidents = self.incidents.lock().unwrap();
            let next = incidents.len() + 1;
            let timestamp = incidents.last().map(|i| i.timestamp + 1.0).unwrap_or(1.0);
            incidents.push(Self::incident(&format!("HUNT-{}", next), timestamp));
        }
        Ok(())
    }

    async fn fetch_graph(&self, incident: &IncidentId) -> ConsoleResult<GraphPayload> {
        self.enter("fetch_graph", Some(incident)).await;
        self.graphs
            .lock()
            .unwrap()
            .get(incident)
            .cloned()
            .unwrap_or_else(|| Err(ConsoleError::Backend("not found".to_string())))
    }

    async fn run_tier3(&self, incident: &IncidentId) -> ConsoleResult<Value> {
        self.enter("run_tier3", Some(incident)).await;
        self.analyses
            .lock()
            .unwrap()
            .get(incident)
            .cloned()
            .unwrap_or_else(|| Ok(json!({"mode": "template", "incident_id": incident.as_str()})))
    }

    async fn simulate_attack_path(&self, request: &SimulationRequest) -> ConsoleResult<Value> {
        self.simulations_seen.lock().unwrap().push(request.clone());
        self.enter("simulate", None).await;
        let scripted = self.simulation.lock().unwrap().clone();
        scripted.unwrap_or_else(|| {
            let path: Vec<&str> = request
                .entry_nodes
                .iter()
                .chain(request.targets.iter())
                .map(|n| n.as_str())
                .collect();
            Ok(json!({"paths": [path], "vector_hints": [request.query]}))
        })
    }

    async fn fetch_report(&self, incident: &IncidentId) -> ConsoleResult<Bytes> {
        self.enter("fetch_report", Some(incident)).await;
        self.reports
            .lock()
            .unwrap()
            .get(incident)
            .cloned()
            .unwrap_or_else(|| Ok(Bytes::from(format!("%PDF-1.4\n% incident {}\n", incident))))
    }

    async fn fetch_storyboard(&self, incident: &IncidentId) -> ConsoleResult<StoryboardTimeline> {
        self.enter("fetch_storyboard", Some(incident)).await;
        let incidents = self.incidents.lock().unwrap();
        let timeline: Vec<TimelineEntry> = incidents
            .iter()
            .filter(|i| &i.id == incident)
            .map(|i| TimelineEntry {
                id: i.id.clone(),
                timestamp: i.timestamp,
                severity: i.severity,
                description: i.description.clone(),
            })
            .collect();
        if timeline.is_empty() {
            return Err(ConsoleError::Backend("incident not found".to_string()));
        }
        let narrative = format!("Incident Storyboard for {}\nTotal related events: {}", incident, timeline.len());
        Ok(StoryboardTimeline { timeline, narrative })
    }

    async fn health(&self) -> ConsoleResult<HealthStatus> {
        self.enter("health", None).await;
        Ok(HealthStatus { status: "ok".to_string() })
    }

    async fn zero_day_scan(&self) -> ConsoleResult<ZeroDayScan> {
        self.enter("zero_day_scan", None).await;
        let status = self
            .zero_day_status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "scanned".to_string());
        Ok(ZeroDayScan { status, findings: json!([]) })
    }
}
