//! Dispatch error taxonomy
//!
//! Every error is kinded so callers can tell retryable conditions from
//! hard rejections without string matching.

#![warn(missing_docs)]

use thiserror::Error;

use lifeline_domain::incident::IncidentStatus;
use lifeline_domain::responder::ResponderStatus;
use lifeline_domain::state_machine::StateError;
use lifeline_spatial::IndexError;

use crate::audit::AuditError;

/// Dispatch core errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Incident creation rejected: the upstream profile precondition was
    /// not attached or is missing fields
    #[error("Emergency profile incomplete for user {user_id}")]
    ProfileIncomplete {
        /// User whose profile is incomplete
        user_id: String,
    },

    /// A state-machine edge was attempted from an illegal state
    #[error(transparent)]
    InvalidTransition(#[from] StateError),

    /// Manual assignment target was reserved or busy at attempt time
    #[error("Responder {responder_id} is not available (status {status:?})")]
    ResponderUnavailable {
        /// Responder the operator chose
        responder_id: String,
        /// Status observed at the attempt
        status: ResponderStatus,
    },

    /// Automatic matching exhausted every candidate within the radius
    #[error(
        "No candidate found within {radius_m} m of incident {incident_id} ({considered} considered)"
    )]
    NoCandidateFound {
        /// Incident that could not be matched
        incident_id: String,
        /// Search radius used
        radius_m: f64,
        /// Candidates that were attempted before giving up
        considered: usize,
    },

    /// Breadcrumb or trail update against a closed or already-escalated
    /// incident
    #[error("Incident {incident_id} is not active (status {status:?})")]
    IncidentNotActive {
        /// Incident identifier
        incident_id: String,
        /// Status the incident was in
        status: IncidentStatus,
    },

    /// Unknown incident, or incident not visible to the caller
    #[error("Incident not found: {0}")]
    IncidentNotFound(String),

    /// Unknown responder
    #[error("Responder not found: {0}")]
    ResponderNotFound(String),

    /// Roster protocol step failed
    #[error(transparent)]
    Index(IndexError),

    /// Audit sink failure
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

impl DispatchError {
    /// Whether the caller may reasonably retry (with another unit, or
    /// after positions change)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::ResponderUnavailable { .. } | DispatchError::NoCandidateFound { .. }
        )
    }
}

impl From<IndexError> for DispatchError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(id) => DispatchError::ResponderNotFound(id),
            IndexError::NotAvailable {
                responder_id,
                status,
            } => DispatchError::ResponderUnavailable {
                responder_id,
                status,
            },
            other => DispatchError::Index(other),
        }
    }
}
