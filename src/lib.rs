//! Silent Sentinel investigation console
//!
//! Client-side orchestration for the incident-response dashboard: the incident
//! list, the analyst's selection, and the asynchronous requests an analyst
//! triggers against the analytics backend.
//!
//! # Components
//!
//! - **`IncidentRepository`**: incident list (newest first) and hunt trigger
//! - **`GraphLoader`**: storyboard graph per incident, normalized for rendering
//! - **`Tier3Controller`**: single-flight deep analysis per incident
//! - **`AttackPathSimulator`**: latest-wins attack path simulation
//! - **`ReportRetriever`**: binary PDF report handed to a `ReportSink`
//! - **`InvestigationSession`**: owns the selection and coordinates the above
//!
//! Every component publishes its state through a `StateCell` that presentation
//! code can subscribe to. Requests keyed by the selection carry a
//! `SelectionTicket`; a response for a selection that has since changed is
//! discarded, so a slow graph for incident A can never replace incident B's.
//!
//! # Example
//!
//! ```no_run
//! use sentinel_console::{ClientConfig, IncidentId, InvestigationSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = InvestigationSession::connect(ClientConfig::new("http://127.0.0.1:8000"))?;
//!     session.refresh_incidents().await?;
//!
//!     if let Some(latest) = session.incidents().state().incidents.first() {
//!         session.select_incident(latest.id.clone()).await?;
//!         session.run_tier3().await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod attack_path;
pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod incidents;
pub mod models;
pub mod report;
pub mod selection;
pub mod session;
pub mod settle;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tier3;

pub use attack_path::{AttackPathQuery, AttackPathSimulator, SimulationOutcome, SimulationState};
pub use backend::{Backend, RemoteBackend};
pub use config::{ClientConfig, SettleConfig};
pub use error::{ConsoleError, ConsoleResult};
pub use graph::{
    DataIntegrityWarning, GraphDiagnostics, GraphLoader, GraphOutcome, GraphState, RenderEdge,
    RenderNode, StoryboardGraph,
};
pub use incidents::{IncidentList, IncidentRepository};
pub use models::{
    HealthStatus, Incident, IncidentId, NodeId, StoryboardTimeline, TimelineEntry, ZeroDayScan,
};
pub use report::{
    report_filename, FileReportSink, Report, ReportRetriever, ReportSink, ReportState, ReportView,
};
pub use selection::{SelectionState, SelectionTicket};
pub use session::{HuntRun, InvestigationSession, RefreshHandle};
pub use settle::{BackoffPoller, FixedDelay, SettlePolicy};
pub use state::StateCell;
pub use tier3::{Tier3Controller, Tier3Outcome, Tier3State};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
