//! Error types for the investigation console

use crate::models::IncidentId;
use thiserror::Error;

/// Errors surfaced by console components.
///
/// Every variant carries plain strings so errors can be cloned into the
/// published state of the component that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// The request could not complete (connect, timeout, undecodable body)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with an explicit error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Caller input violated a precondition; no request was issued
    #[error("Validation error: {0}")]
    Validation(String),

    /// A tier-3 analysis is already running for this incident
    #[error("Analysis already running for incident {0}")]
    Busy(IncidentId),

    /// The host could not persist a retrieved report
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Client configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsoleError {
    /// Whether this error was raised before any request left the process.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ConsoleError::Validation(_) | ConsoleError::Busy(_))
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        ConsoleError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        ConsoleError::Transport(format!("malformed response body: {}", e))
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(e: std::io::Error) -> Self {
        ConsoleError::Persistence(e.to_string())
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
