//! Tier-3 Analysis Controller
//!
//! Per-incident state machine: `Idle -> Running -> (Succeeded | Failed)`.
//! At most one analysis request is in flight per incident.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::IncidentId;
use crate::selection::SelectionTicket;
use crate::state::StateCell;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Tier3State {
    #[default]
    Idle,
    Running,
    Succeeded(Arc<Value>),
    Failed(ConsoleError),
}

impl Tier3State {
    pub fn is_running(&self) -> bool {
        matches!(self, Tier3State::Running)
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            Tier3State::Succeeded(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tier3Outcome {
    Completed(Arc<Value>),
    /// The selection changed while the analysis ran; the result was dropped
    Discarded,
}

pub struct Tier3Controller {
    backend: Arc<dyn Backend>,
    runs: StateCell<HashMap<IncidentId, Tier3State>>,
}

impl Tier3Controller {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            runs: StateCell::default(),
        }
    }

    pub fn state_for(&self, incident: &IncidentId) -> Tier3State {
        self.runs.get().get(incident).cloned().unwrap_or_default()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<HashMap<IncidentId, Tier3State>> {
        self.runs.subscribe()
    }

    /// Run analysis for the ticket's incident.
    ///
    /// Returns `Busy` if one is already running for that incident. If another
    /// incident is selected before the response arrives, the result is dropped
    /// and the incident returns to the state it had before this run.
    /// Re-selecting the same incident keeps the result.
    pub async fn run(&self, ticket: &SelectionTicket) -> ConsoleResult<Tier3Outcome> {
        let incident = ticket.incident().clone();

        let mut busy = false;
        let mut previous = None;
        self.runs.update_if(|runs| {
            if !ticket.is_same_incident() {
                return false;
            }
            let entry = runs.entry(incident.clone()).or_default();
            if entry.is_running() {
                busy = true;
                return false;
            }
            previous = Some(std::mem::replace(entry, Tier3State::Running));
            true
        });

        if busy {
            debug!("Tier-3 analysis already running for {}", incident);
            return Err(ConsoleError::Busy(incident));
        }
        let Some(previous) = previous else {
            debug!("Selection moved before tier-3 request for {} was issued", incident);
            return Ok(Tier3Outcome::Discarded);
        };

        info!("Running tier-3 analysis for {}", incident);
        let result = self.backend.run_tier3(&incident).await.map(Arc::new);

        let current = self.runs.update(|runs| {
            let current = ticket.is_same_incident();
            let next = if current {
                match &result {
                    Ok(analysis) => Tier3State::Succeeded(Arc::clone(analysis)),
                    Err(error) => Tier3State::Failed(error.clone()),
                }
            } else {
                previous
            };
            runs.insert(incident.clone(), next);
            current
        });

        if !current {
            debug!("Discarding stale tier-3 result for {}", incident);
            return Ok(Tier3Outcome::Discarded);
        }
        match result {
            Ok(analysis) => Ok(Tier3Outcome::Completed(analysis)),
            Err(e) => {
                warn!("Tier-3 analysis for {} failed: {}", incident, e);
                Err(e)
            }
        }
    }
}
