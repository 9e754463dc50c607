//! Graph Loader
//!
//! Fetches the storyboard graph for the selected incident and normalizes it
//! into render-ready nodes and edges.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{GraphPayload, IncidentId, NodeId};
use crate::selection::SelectionTicket;
use crate::state::StateCell;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderNode {
    pub id: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderEdge {
    pub from: NodeId,
    pub to: NodeId,
}

/// An edge that referenced a node the backend never declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataIntegrityWarning {
    pub from: NodeId,
    pub to: NodeId,
    pub missing: Vec<NodeId>,
}

impl fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(|n| n.as_str()).collect();
        write!(
            f,
            "dropped edge {} -> {}: unknown node(s) {}",
            self.from,
            self.to,
            missing.join(", ")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDiagnostics {
    pub dropped_edges: usize,
    /// Repeated node declarations collapsed into one
    pub duplicate_nodes: usize,
    pub warnings: Vec<DataIntegrityWarning>,
}

/// Normalized storyboard graph of one incident. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryboardGraph {
    pub incident: IncidentId,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub diagnostics: GraphDiagnostics,
}

impl StoryboardGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Map a raw payload to render form, dropping edges with unknown endpoints.
pub fn normalize(incident: IncidentId, payload: GraphPayload) -> StoryboardGraph {
    let declared = payload.nodes.len();
    let node_ids: IndexSet<NodeId> = payload.nodes.into_iter().map(|n| n.id).collect();

    let mut diagnostics = GraphDiagnostics {
        duplicate_nodes: declared - node_ids.len(),
        ..GraphDiagnostics::default()
    };

    let mut edges = Vec::with_capacity(payload.edges.len());
    for edge in payload.edges {
        let missing: Vec<NodeId> = [&edge.from, &edge.to]
            .into_iter()
            .filter(|id| !node_ids.contains(*id))
            .cloned()
            .collect();

        if missing.is_empty() {
            edges.push(RenderEdge { from: edge.from, to: edge.to });
        } else {
            diagnostics.dropped_edges += 1;
            diagnostics.warnings.push(DataIntegrityWarning {
                from: edge.from,
                to: edge.to,
                missing,
            });
        }
    }

    let nodes = node_ids
        .into_iter()
        .map(|id| RenderNode { label: id.as_str().to_string(), id })
        .collect();

    StoryboardGraph { incident, nodes, edges, diagnostics }
}

/// What the graph panel shows
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GraphState {
    #[default]
    Empty,
    Loading(IncidentId),
    Ready(Arc<StoryboardGraph>),
    Unavailable {
        incident: IncidentId,
        error: ConsoleError,
    },
}

/// Result of a `load` call
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOutcome {
    /// No incident; graph state cleared without a request
    Cleared,
    Loaded(Arc<StoryboardGraph>),
    /// The selection changed before the response arrived
    Discarded,
}

pub struct GraphLoader {
    backend: Arc<dyn Backend>,
    state: StateCell<GraphState>,
}

impl GraphLoader {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: StateCell::default(),
        }
    }

    pub fn state(&self) -> GraphState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<GraphState> {
        self.state.subscribe()
    }

    /// Load the graph for the ticket's incident.
    ///
    /// `None` clears the panel and issues no request. A backend error replaces
    /// any previously shown graph. Responses for a selection that has since
    /// changed are dropped without touching the state.
    pub async fn load(&self, ticket: Option<&SelectionTicket>) -> ConsoleResult<GraphOutcome> {
        let Some(ticket) = ticket else {
            self.state.set(GraphState::Empty);
            return Ok(GraphOutcome::Cleared);
        };
        let incident = ticket.incident().clone();

        let started = self.state.update_if(|state| {
            if !ticket.is_current() {
                return false;
            }
            *state = GraphState::Loading(incident.clone());
            true
        });
        if !started {
            debug!("Selection moved before graph request for {} was issued", incident);
            return Ok(GraphOutcome::Discarded);
        }

        info!("Loading storyboard graph for {}", incident);
        let result = self
            .backend
            .fetch_graph(&incident)
            .await
            .map(|payload| Arc::new(normalize(incident.clone(), payload)));

        let applied = self.state.update_if(|state| {
            if !ticket.is_current() {
                return false;
            }
            *state = match &result {
                Ok(graph) => GraphState::Ready(Arc::clone(graph)),
                Err(error) => GraphState::Unavailable {
                    incident: incident.clone(),
                    error: error.clone(),
                },
            };
            true
        });
        if !applied {
            debug!("Discarding stale graph response for {}", incident);
            return Ok(GraphOutcome::Discarded);
        }

        let graph = result.map_err(|e| {
            warn!("Graph for {} unavailable: {}", incident, e);
            e
        })?;
        for warning in &graph.diagnostics.warnings {
            warn!("Storyboard {}: {}", incident, warning);
        }
        Ok(GraphOutcome::Loaded(graph))
    }
}
