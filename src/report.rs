//! Report Retriever
//!
//! Fetches the generated PDF for an incident and hands it, byte for byte, to
//! the host's persistence mechanism.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::ConsoleResult;
use crate::models::IncidentId;
use crate::state::StateCell;

/// File name a report is saved under. Path separators in the id are replaced
/// so the name always stays a single path component.
pub fn report_filename(incident: &IncidentId) -> String {
    let safe: String = incident
        .as_str()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("incident_{}.pdf", safe)
}

/// A retrieved report. The payload is never decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub incident: IncidentId,
    pub filename: String,
    pub payload: Bytes,
}

impl Report {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Host-side persistence for downloaded reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Store the report, returning where it ended up
    async fn save(&self, report: &Report) -> ConsoleResult<PathBuf>;
}

/// Writes reports into a directory
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn save(&self, report: &Report) -> ConsoleResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&report.filename);
        tokio::fs::write(&path, &report.payload).await?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ReportState {
    #[default]
    Idle,
    Fetching(IncidentId),
    Saved {
        incident: IncidentId,
        location: PathBuf,
        bytes: usize,
    },
    Failed {
        incident: IncidentId,
        error: crate::error::ConsoleError,
    },
}

/// Published download state. Only the most recently issued download may
/// update it.
#[derive(Debug, Clone, Default)]
pub struct ReportView {
    pub state: ReportState,
    latest: u64,
}

pub struct ReportRetriever {
    backend: Arc<dyn Backend>,
    sink: Arc<dyn ReportSink>,
    track: StateCell<ReportView>,
}

impl ReportRetriever {
    pub fn new(backend: Arc<dyn Backend>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            backend,
            sink,
            track: StateCell::default(),
        }
    }

    pub(crate) fn set_sink(&mut self, sink: Arc<dyn ReportSink>) {
        self.sink = sink;
    }

    pub fn state(&self) -> ReportState {
        self.track.get().state
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<ReportView> {
        self.track.subscribe()
    }

    /// Fetch the report for an incident
    pub async fn fetch(&self, incident: &IncidentId) -> ConsoleResult<Report> {
        let payload = self.backend.fetch_report(incident).await?;
        Ok(Report {
            incident: incident.clone(),
            filename: report_filename(incident),
            payload,
        })
    }

    /// Fetch the report and store it through the sink.
    ///
    /// The caller always gets this download's outcome; the published state
    /// only follows the most recently issued download.
    pub async fn download(&self, incident: &IncidentId) -> ConsoleResult<PathBuf> {
        let seq = self.track.update(|track| {
            track.latest += 1;
            track.state = ReportState::Fetching(incident.clone());
            track.latest
        });
        info!("Downloading report for {}", incident);

        let saved = match self.fetch(incident).await {
            Ok(report) => self.sink.save(&report).await.map(|path| (path, report.len())),
            Err(e) => Err(e),
        };

        let latest = self.track.update_if(|track| {
            if track.latest != seq {
                return false;
            }
            track.state = match &saved {
                Ok((location, bytes)) => ReportState::Saved {
                    incident: incident.clone(),
                    location: location.clone(),
                    bytes: *bytes,
                },
                Err(error) => ReportState::Failed {
                    incident: incident.clone(),
                    error: error.clone(),
                },
            };
            true
        });
        if !latest {
            debug!("Report download #{} for {} superseded", seq, incident);
        }

        match saved {
            Ok((location, bytes)) => {
                info!("Saved {} byte report to {}", bytes, location.display());
                Ok(location)
            }
            Err(e) => {
                warn!("Report download for {} failed: {}", incident, e);
                Err(e)
            }
        }
    }
}
