//! Investigation Session: the coordinator
//!
//! Owns the analyst's selection and modal state and sequences calls across
//! the incident repository, graph loader, tier-3 controller, attack path
//! simulator and report retriever. Only the session mutates the selection;
//! components receive a `SelectionTicket` for the selection they serve.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::attack_path::{AttackPathQuery, AttackPathSimulator, SimulationOutcome};
use crate::backend::{Backend, RemoteBackend};
use crate::config::ClientConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::graph::{GraphLoader, GraphOutcome};
use crate::incidents::IncidentRepository;
use crate::models::{HealthStatus, IncidentId, StoryboardTimeline, ZeroDayScan};
use crate::report::{FileReportSink, ReportRetriever, ReportSink};
use crate::selection::{SelectionState, SelectionTicket};
use crate::settle::{self, SettlePolicy};
use crate::state::StateCell;
use crate::tier3::{Tier3Controller, Tier3Outcome, Tier3State};

/// Background refresh scheduled by [`InvestigationSession::run_hunt`]
pub type RefreshHandle = JoinHandle<ConsoleResult<usize>>;

/// A triggered hunt and the refresh that follows it
pub struct HuntRun {
    /// Outcome of the trigger request, also published as `IncidentList::hunt_error`
    pub trigger: ConsoleResult<()>,
    pub refresh: RefreshHandle,
}

pub struct InvestigationSession {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    selection: StateCell<SelectionState>,
    incidents: Arc<IncidentRepository>,
    graph: GraphLoader,
    tier3: Tier3Controller,
    simulator: AttackPathSimulator,
    reports: ReportRetriever,
    settle: Arc<dyn SettlePolicy>,
}

impl InvestigationSession {
    /// Session talking to the HTTP backend named in `config`. Reports are
    /// saved to the current directory until another sink is configured.
    pub fn connect(config: ClientConfig) -> ConsoleResult<Self> {
        let backend = Arc::new(RemoteBackend::new(&config)?);
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: ClientConfig, backend: Arc<dyn Backend>) -> Self {
        let settle = settle::from_config(&config.settle);
        let sink: Arc<dyn ReportSink> = Arc::new(FileReportSink::new("."));
        Self {
            selection: StateCell::default(),
            incidents: Arc::new(IncidentRepository::new(Arc::clone(&backend))),
            graph: GraphLoader::new(Arc::clone(&backend)),
            tier3: Tier3Controller::new(Arc::clone(&backend)),
            simulator: AttackPathSimulator::new(Arc::clone(&backend)),
            reports: ReportRetriever::new(Arc::clone(&backend), sink),
            settle,
            backend,
            config,
        }
    }

    /// Store downloaded reports through `sink`
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.reports.set_sink(sink);
        self
    }

    /// Replace the post-hunt refresh strategy
    pub fn with_settle_policy(mut self, policy: Arc<dyn SettlePolicy>) -> Self {
        self.settle = policy;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn selection(&self) -> SelectionState {
        self.selection.get()
    }

    pub fn subscribe_selection(&self) -> tokio::sync::watch::Receiver<SelectionState> {
        self.selection.subscribe()
    }

    pub fn incidents(&self) -> &IncidentRepository {
        &self.incidents
    }

    pub fn graph(&self) -> &GraphLoader {
        &self.graph
    }

    pub fn tier3(&self) -> &Tier3Controller {
        &self.tier3
    }

    pub fn simulator(&self) -> &AttackPathSimulator {
        &self.simulator
    }

    pub fn reports(&self) -> &ReportRetriever {
        &self.reports
    }

    pub fn settle_policy(&self) -> &dyn SettlePolicy {
        self.settle.as_ref()
    }

    fn ticket(&self) -> ConsoleResult<SelectionTicket> {
        SelectionTicket::capture(self.selection.subscribe())
            .ok_or_else(|| ConsoleError::Validation("no incident selected".to_string()))
    }

    pub async fn refresh_incidents(&self) -> ConsoleResult<usize> {
        self.incidents.refresh().await
    }

    /// Select an incident, open its modal and load its graph.
    ///
    /// If another incident is selected before the graph arrives, this call's
    /// result is discarded.
    pub async fn select_incident(&self, incident: IncidentId) -> ConsoleResult<GraphOutcome> {
        let generation = self.selection.update(|s| s.select(incident.clone()));
        debug!("Selected {} (generation {})", incident, generation);
        let ticket = SelectionTicket::new(incident, generation, self.selection.subscribe());
        self.graph.load(Some(&ticket)).await
    }

    /// Deselect; closes the modal and clears the graph without a request
    pub async fn clear_selection(&self) -> ConsoleResult<GraphOutcome> {
        self.selection.update(|s| s.clear());
        self.graph.load(None).await
    }

    /// Close the modal. The graph panel stays keyed to the last selection.
    pub fn close_modal(&self) {
        self.selection.update_if(|s| s.close_modal());
    }

    /// Trigger a hunt and schedule one refresh through the settle policy.
    ///
    /// The refresh is a heuristic: the backend does not report when the hunt
    /// finishes, so the refreshed list may not contain its findings yet. It is
    /// scheduled even when the trigger fails, since a timed-out hunt may still
    /// have produced incidents.
    pub async fn run_hunt(&self) -> HuntRun {
        let trigger = self.incidents.trigger_hunt().await;

        let repository = Arc::clone(&self.incidents);
        let policy = Arc::clone(&self.settle);
        let baseline = repository.state().len();
        info!("Scheduling post-hunt refresh ({})", policy.name());
        let refresh = tokio::spawn(async move { policy.settle(&repository, baseline).await });
        HuntRun { trigger, refresh }
    }

    /// Run tier-3 analysis for the selected incident
    pub async fn run_tier3(&self) -> ConsoleResult<Tier3Outcome> {
        let ticket = self.ticket()?;
        self.tier3.run(&ticket).await
    }

    /// Tier-3 state of the selected incident
    pub fn current_tier3(&self) -> Option<Tier3State> {
        let selected = self.selection.get().selected_incident_id?;
        Some(self.tier3.state_for(&selected))
    }

    pub async fn simulate_path(&self, query: AttackPathQuery) -> ConsoleResult<SimulationOutcome> {
        self.simulator.simulate(query).await
    }

    /// Download the selected incident's report through the report sink
    pub async fn download_report(&self) -> ConsoleResult<PathBuf> {
        let incident = self.selected()?;
        self.reports.download(&incident).await
    }

    /// Timeline and narrative for the selected incident
    pub async fn storyboard_timeline(&self) -> ConsoleResult<StoryboardTimeline> {
        let incident = self.selected()?;
        self.backend.fetch_storyboard(&incident).await
    }

    pub async fn health(&self) -> ConsoleResult<HealthStatus> {
        self.backend.health().await
    }

    pub async fn zero_day_scan(&self) -> ConsoleResult<ZeroDayScan> {
        self.incidents.zero_day_scan().await
    }

    fn selected(&self) -> ConsoleResult<IncidentId> {
        self.selection
            .get()
            .selected_incident_id
            .ok_or_else(|| ConsoleError::Validation("no incident selected".to_string()))
    }
}
