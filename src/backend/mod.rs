//! Backend contract consumed by the console
//!
//! The hunt engine, graph builder, tier-3 analyzer, path simulator and report
//! renderer all live behind this trait. `RemoteBackend` speaks to them over
//! HTTP; tests substitute scripted implementations.

pub mod remote;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::ConsoleResult;
use crate::models::{
    GraphPayload, HealthStatus, Incident, IncidentId, SimulationRequest, StoryboardTimeline,
    ZeroDayScan,
};

pub use remote::RemoteBackend;

/// Request/response operations offered by the analytics backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All incidents, ascending by creation
    async fn list_incidents(&self) -> ConsoleResult<Vec<Incident>>;

    /// Ask the backend to start a hunt; returns once the request is accepted
    async fn trigger_hunt(&self) -> ConsoleResult<()>;

    /// Raw storyboard graph around an incident's source
    async fn fetch_graph(&self, incident: &IncidentId) -> ConsoleResult<GraphPayload>;

    /// Run tier-3 analysis; the result shape is owned by the backend
    async fn run_tier3(&self, incident: &IncidentId) -> ConsoleResult<Value>;

    /// Run an attack path simulation; the result shape is owned by the backend
    async fn simulate_attack_path(&self, request: &SimulationRequest) -> ConsoleResult<Value>;

    /// Generated PDF report, untouched
    async fn fetch_report(&self, incident: &IncidentId) -> ConsoleResult<Bytes>;

    /// Timeline of related events plus narrative
    async fn fetch_storyboard(&self, incident: &IncidentId) -> ConsoleResult<StoryboardTimeline>;

    async fn health(&self) -> ConsoleResult<HealthStatus>;

    /// Trigger an immediate zero-day scan and return its findings
    async fn zero_day_scan(&self) -> ConsoleResult<ZeroDayScan>;
}

/// Extract the message of a `{"error": ...}` response.
///
/// Only bodies that carry nothing but an error (optionally with a `status`)
/// count; a degraded result that still has a payload next to its error is a
/// success.
pub fn explicit_error(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    let error = object.get("error").filter(|v| !v.is_null())?;
    if !object.keys().all(|k| k == "error" || k == "status") {
        return None;
    }
    Some(match error {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explicit_error_detection() {
        assert_eq!(
            explicit_error(&json!({"error": "incident not found"})),
            Some("incident not found".to_string())
        );
        assert_eq!(
            explicit_error(&json!({"status": "error", "error": "scanner offline"})),
            Some("scanner offline".to_string())
        );
        assert_eq!(explicit_error(&json!({"error": {"code": 7}})), Some("{\"code\":7}".to_string()));
    }

    #[test]
    fn test_payload_with_error_is_not_a_failure() {
        let degraded = json!({
            "mode": "llm_error_fallback",
            "error": "rate limited",
            "analysis": {"summary": "template"},
        });
        assert_eq!(explicit_error(&degraded), None);
        assert_eq!(explicit_error(&json!({"paths": [], "vector_hints": []})), None);
        assert_eq!(explicit_error(&json!({"error": null})), None);
        assert_eq!(explicit_error(&json!(["error"])), None);
    }
}
