//! Data models shared by the console components
//!
//! These types mirror the backend's JSON payloads. Identifiers are accepted
//! as either strings or numbers on the wire and are always handled as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Text(String),
    Number(serde_json::Number),
}

impl LooseId {
    fn into_string(self) -> String {
        match self {
            LooseId::Text(s) => s,
            LooseId::Number(n) => n.to_string(),
        }
    }
}

/// Opaque, stable identifier of an incident
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct IncidentId(String);

impl IncidentId {
    pub fn new(id: impl Into<String>) -> Self {
        IncidentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IncidentId {
    fn from(id: &str) -> Self {
        IncidentId(id.to_string())
    }
}

impl From<String> for IncidentId {
    fn from(id: String) -> Self {
        IncidentId(id)
    }
}

impl<'de> Deserialize<'de> for IncidentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        LooseId::deserialize(deserializer).map(|id| IncidentId(id.into_string()))
    }
}

/// Identifier of an entity in the infrastructure graph (host, account, service)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        LooseId::deserialize(deserializer).map(|id| NodeId(id.into_string()))
    }
}

/// A detected security incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    /// Unix seconds
    pub timestamp: f64,
    #[serde(default)]
    pub description: String,
    /// Graph node the detection fired on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<f64>,
    #[serde(default)]
    pub auto_remediated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_notes: Option<String>,
}

impl Incident {
    /// Detection time, if the timestamp is representable
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// A node as sent by the storyboard graph endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNodePayload {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

/// An edge as sent by the storyboard graph endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdgePayload {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

/// Raw storyboard graph, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<GraphNodePayload>,
    #[serde(default)]
    pub edges: Vec<GraphEdgePayload>,
}

/// Body of an attack path simulation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub entry_nodes: Vec<NodeId>,
    pub targets: Vec<NodeId>,
    pub query: String,
}

/// Backend health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// One event on an incident's storyboard timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: IncidentId,
    pub timestamp: f64,
    #[serde(default)]
    pub severity: Option<f64>,
    #[serde(default)]
    pub description: String,
}

/// Related events for an incident's source plus a human-readable narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryboardTimeline {
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub narrative: String,
}

/// Outcome of an on-demand zero-day scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroDayScan {
    pub status: String,
    #[serde(default)]
    pub findings: serde_json::Value,
}
