//! Core data types and errors for the departure pipeline.

use serde::Serialize;

use crate::identifiers::*;

// ============================================================================
// Data Structures
// ============================================================================

/// The single most relevant stop matching a user query on one endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedStop {
    pub id: StopIdentifier,
    pub name: String,
}

impl ResolvedStop {
    pub fn new(id: impl Into<StopIdentifier>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Stop query is empty")]
    EmptyQuery,

    #[error("Upstream request {url} failed with status {status}")]
    Upstream { url: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not decode upstream response: {0}")]
    Decode(String),

    #[error("All {attempted} data sources failed")]
    AllSourcesFailed { attempted: usize },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl TransitError {
    /// Whether the failure is local to one endpoint and the next one may
    /// still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransitError::Upstream { .. }
                | TransitError::Transport(_)
                | TransitError::Decode(_)
                | TransitError::MalformedRecord(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TransitError>;
