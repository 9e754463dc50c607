//! RemoteBackend: HTTP client for the Sentinel analytics service

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{explicit_error, Backend};
use crate::config::ClientConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    GraphPayload, HealthStatus, Incident, IncidentId, SimulationRequest, StoryboardTimeline,
    ZeroDayScan,
};

/// Characters left untouched when an id is placed in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Backend reached over HTTP at the configured base URL.
pub struct RemoteBackend {
    base_url: String,
    http_client: Client,
}

impl RemoteBackend {
    /// Create a backend client from the injected configuration.
    ///
    /// # Example
    /// ```no_run
    /// # use sentinel_console::{ClientConfig, RemoteBackend};
    /// let backend = RemoteBackend::new(&ClientConfig::new("http://127.0.0.1:8000")).unwrap();
    /// ```
    pub fn new(config: &ClientConfig) -> ConsoleResult<Self> {
        config.validate()?;
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConsoleError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.endpoint().to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn incident_url(&self, prefix: &str, incident: &IncidentId, suffix: &str) -> String {
        let id = utf8_percent_encode(incident.as_str(), PATH_SEGMENT);
        format!("{}{}{}{}", self.base_url, prefix, id, suffix)
    }

    /// Turn non-success statuses into `Backend` errors, preferring the body's
    /// `error` field as the message.
    async fn check_status(response: Response) -> ConsoleResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| explicit_error(&body))
            .unwrap_or_else(|| format!("backend returned {}", status));
        Err(ConsoleError::Backend(message))
    }

    /// Decode a JSON body, mapping `{"error": ...}` to a `Backend` error
    async fn read_json<T: DeserializeOwned>(response: Response) -> ConsoleResult<T> {
        let response = Self::check_status(response).await?;
        let body: Value = response.json().await?;
        if let Some(message) = explicit_error(&body) {
            return Err(ConsoleError::Backend(message));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ConsoleResult<T> {
        debug!("GET {}", url);
        let response = self.http_client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, url: &str, body: Option<&Value>) -> ConsoleResult<T> {
        debug!("POST {}", url);
        let mut request = self.http_client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn list_incidents(&self) -> ConsoleResult<Vec<Incident>> {
        self.get_json(&self.url("/incidents")).await
    }

    async fn trigger_hunt(&self) -> ConsoleResult<()> {
        let url = self.url("/agent/run");
        debug!("POST {}", url);
        let response = self.http_client.post(&url).send().await?;
        // Acceptance is all that matters; the body is not relied upon
        Self::check_status(response).await?;
        Ok(())
    }

    async fn fetch_graph(&self, incident: &IncidentId) -> ConsoleResult<GraphPayload> {
        self.get_json(&self.incident_url("/storyboard/graph/", incident, "")).await
    }

    async fn run_tier3(&self, incident: &IncidentId) -> ConsoleResult<Value> {
        self.post_json(&self.incident_url("/tier3/analyze/", incident, ""), None).await
    }

    async fn simulate_attack_path(&self, request: &SimulationRequest) -> ConsoleResult<Value> {
        let body = serde_json::to_value(request)?;
        self.post_json(&self.url("/attackpath/simulate"), Some(&body)).await
    }

    async fn fetch_report(&self, incident: &IncidentId) -> ConsoleResult<Bytes> {
        let url = self.incident_url("/incident/", incident, "/report");
        debug!("GET {}", url);
        let response = self.http_client.get(&url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?)
    }

    async fn fetch_storyboard(&self, incident: &IncidentId) -> ConsoleResult<StoryboardTimeline> {
        self.get_json(&self.incident_url("/storyboard/", incident, "")).await
    }

    async fn health(&self) -> ConsoleResult<HealthStatus> {
        self.get_json(&self.url("/health")).await
    }

    async fn zero_day_scan(&self) -> ConsoleResult<ZeroDayScan> {
        self.post_json(&self.url("/zero-day/scan"), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_built_from_config() {
        let backend = RemoteBackend::new(&ClientConfig::new("http://soc:8000/")).unwrap();
        assert_eq!(backend.url("/incidents"), "http://soc:8000/incidents");
        assert_eq!(
            backend.incident_url("/incident/", &IncidentId::new("INC-17.3"), "/report"),
            "http://soc:8000/incident/INC-17.3/report"
        );
    }

    #[test]
    fn test_incident_ids_are_escaped() {
        let backend = RemoteBackend::new(&ClientConfig::default()).unwrap();
        assert_eq!(
            backend.incident_url("/storyboard/graph/", &IncidentId::new("a/b c"), ""),
            "http://127.0.0.1:8000/storyboard/graph/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            RemoteBackend::new(&ClientConfig::new("localhost:8000")),
            Err(ConsoleError::Config(_))
        ));
    }
}
