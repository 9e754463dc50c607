//! Incident Repository
//!
//! Holds the incident list, newest first, and triggers hunts. Overlapping
//! refreshes are ordered by issue sequence: the outcome of the most recently
//! issued refresh wins, whatever order the responses arrive in.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{Incident, ZeroDayScan};
use crate::state::StateCell;

/// Render-facing view of the incident list
#[derive(Debug, Clone, Default)]
pub struct IncidentList {
    /// Most recent first
    pub incidents: Arc<Vec<Incident>>,
    /// A refresh is in flight
    pub loading: bool,
    /// Error of the latest refresh, cleared by the next success
    pub error: Option<ConsoleError>,
    /// Error of the latest hunt trigger, cleared by the next accepted trigger
    pub hunt_error: Option<ConsoleError>,
    issued: u64,
    applied: u64,
    in_flight: usize,
}

impl IncidentList {
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

pub struct IncidentRepository {
    backend: Arc<dyn Backend>,
    state: StateCell<IncidentList>,
}

impl IncidentRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: StateCell::default(),
        }
    }

    pub fn state(&self) -> IncidentList {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<IncidentList> {
        self.state.subscribe()
    }

    /// Reload the list. Returns the number of incidents now held.
    ///
    /// On failure the previous list is kept and the error is published.
    pub async fn refresh(&self) -> ConsoleResult<usize> {
        let seq = self.state.update(|list| {
            list.issued += 1;
            list.in_flight += 1;
            list.loading = true;
            list.issued
        });
        debug!("Refreshing incident list (request #{})", seq);

        let result = self.backend.list_incidents().await.map(|mut incidents| {
            // Backend order is ascending by creation
            incidents.reverse();
            incidents
        });

        self.state.update(|list| {
            list.in_flight -= 1;
            list.loading = list.in_flight > 0;

            if seq < list.applied {
                debug!("Ignoring superseded incident list response #{}", seq);
                return match &result {
                    Ok(_) => Ok(list.len()),
                    Err(e) => Err(e.clone()),
                };
            }
            list.applied = seq;

            match result {
                Ok(incidents) => {
                    info!("Loaded {} incidents", incidents.len());
                    list.incidents = Arc::new(incidents);
                    list.error = None;
                    Ok(list.len())
                }
                Err(e) => {
                    warn!("Incident refresh failed: {}", e);
                    list.error = Some(e.clone());
                    Err(e)
                }
            }
        })
    }

    /// Ask the backend to start a hunt without waiting for it to finish.
    ///
    /// The backend gives no completion signal; callers schedule a refresh
    /// through a settle policy.
    pub async fn trigger_hunt(&self) -> ConsoleResult<()> {
        info!("Triggering hunt");
        let result = self.backend.trigger_hunt().await;
        if let Err(e) = &result {
            warn!("Hunt trigger failed: {}", e);
        }
        self.state.update(|list| list.hunt_error = result.clone().err());
        result
    }

    /// Run an immediate zero-day scan
    pub async fn zero_day_scan(&self) -> ConsoleResult<ZeroDayScan> {
        info!("Requesting zero-day scan");
        let scan = self.backend.zero_day_scan().await?;
        if scan.status == "error" {
            return Err(ConsoleError::Backend("zero-day scan reported an error".to_string()));
        }
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_refresh_reverses_backend_order() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_incidents(vec![
            ScriptedBackend::incident("1", 100.0),
            ScriptedBackend::incident("2", 200.0),
        ]);
        let repo = IncidentRepository::new(backend.clone());

        assert_eq!(repo.refresh().await.unwrap(), 2);
        let ids: Vec<_> = repo.state().incidents.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert!(!repo.state().loading);

        // Unchanged backend data gives an identical list
        repo.refresh().await.unwrap();
        let again: Vec<_> = repo.state().incidents.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(again, ids);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_list() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_incidents(vec![ScriptedBackend::incident("1", 100.0)]);
        let repo = IncidentRepository::new(backend.clone());
        repo.refresh().await.unwrap();

        backend.fail_next_list(ConsoleError::Transport("connection refused".into()));
        assert!(repo.refresh().await.is_err());

        let state = repo.state();
        assert_eq!(state.len(), 1);
        assert!(matches!(state.error, Some(ConsoleError::Transport(_))));

        repo.refresh().await.unwrap();
        assert!(repo.state().error.is_none());
    }

    #[tokio::test]
    async fn test_latest_issued_refresh_wins() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_incidents(vec![ScriptedBackend::incident("1", 100.0)]);
        backend.hold("list_incidents");
        let repo = Arc::new(IncidentRepository::new(backend.clone()));

        let older = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.refresh().await })
        };
        backend.wait_entered("list_incidents").await;
        assert!(repo.state().loading);

        // The newer refresh overtakes the held one
        backend.set_incidents(vec![
            ScriptedBackend::incident("1", 100.0),
            ScriptedBackend::incident("2", 200.0),
        ]);
        backend.lift("list_incidents");
        assert_eq!(repo.refresh().await.unwrap(), 2);
        assert!(repo.state().loading);

        // The older response arrives last with outdated data and is ignored
        backend.set_incidents(vec![ScriptedBackend::incident("1", 100.0)]);
        backend.release("list_incidents");
        assert_eq!(older.await.unwrap().unwrap(), 2);

        let state = repo.state();
        let ids: Vec<_> = state.incidents.iter().map(|i| i.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert!(!state.loading);
        assert_eq!(backend.calls("list_incidents"), 2);
    }

    #[tokio::test]
    async fn test_superseded_failure_keeps_newer_list() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_incidents(vec![ScriptedBackend::incident("1", 100.0)]);
        backend.hold("list_incidents");
        let repo = Arc::new(IncidentRepository::new(backend.clone()));

        let older = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.refresh().await })
        };
        backend.wait_entered("list_incidents").await;
        backend.lift("list_incidents");
        repo.refresh().await.unwrap();

        backend.fail_next_list(ConsoleError::Transport("connection reset".into()));
        backend.release("list_incidents");
        assert!(older.await.unwrap().is_err());

        let state = repo.state();
        assert_eq!(state.len(), 1);
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_hunt_failure_does_not_block_refresh() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.fail_hunts(ConsoleError::Backend("engine offline".into()));
        let repo = IncidentRepository::new(backend.clone());

        assert!(repo.trigger_hunt().await.is_err());
        assert!(repo.state().hunt_error.is_some());

        backend.set_incidents(vec![ScriptedBackend::incident("1", 1.0)]);
        assert_eq!(repo.refresh().await.unwrap(), 1);
        assert_eq!(backend.calls("trigger_hunt"), 1);
    }

    #[tokio::test]
    async fn test_zero_day_scan_error_status() {
        let backend = Arc::new(ScriptedBackend::new());
        let repo = IncidentRepository::new(backend.clone());

        let scan = repo.zero_day_scan().await.unwrap();
        assert_eq!(scan.status, "scanned");

        backend.set_zero_day_status("error");
        assert!(matches!(repo.zero_day_scan().await, Err(ConsoleError::Backend(_))));
    }
}
