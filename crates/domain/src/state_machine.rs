//! Incident lifecycle state machine
//!
//! Legal edges:
//!
//! ```text
//! active → acknowledged → dispatched → resolved
//! active → dispatched
//! dispatched → dispatched            (operator reassignment only)
//! active → false_alarm               (user cancel)
//! active|acknowledged|dispatched → expired
//! ```
//!
//! Edge legality is answered by a single table ([`legal`]); the functions
//! in this module add the per-edge guards and timestamp side effects. A
//! failed transition always leaves the incident unchanged.

#![warn(missing_docs)]

use thiserror::Error;

use crate::incident::{Incident, IncidentStatus};
use crate::metrics;

/// State machine errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The requested edge does not exist from the current status
    #[error("Invalid transition from {from:?} to {to:?} for incident {incident_id}")]
    InvalidTransition {
        /// Incident identifier
        incident_id: String,
        /// Status the incident was in
        from: IncidentStatus,
        /// Status that was requested
        to: IncidentStatus,
    },

    /// The caller is not the assigned responder
    #[error("Responder {caller} is not assigned to incident {incident_id}")]
    ResponderMismatch {
        /// Incident identifier
        incident_id: String,
        /// Responder that attempted the transition
        caller: String,
    },
}

/// The transition legality table
///
/// This is the only place edges are defined; every transition function
/// checks here first.
pub fn legal(from: IncidentStatus, to: IncidentStatus) -> bool {
    use IncidentStatus::*;
    matches!(
        (from, to),
        (Active, Acknowledged)
            | (Active, Dispatched)
            | (Acknowledged, Dispatched)
            | (Dispatched, Dispatched)
            | (Dispatched, Resolved)
            | (Active, FalseAlarm)
            | (Active, Expired)
            | (Acknowledged, Expired)
            | (Dispatched, Expired)
    )
}

fn guard(incident: &Incident, to: IncidentStatus) -> Result<(), StateError> {
    if legal(incident.status, to) {
        Ok(())
    } else {
        Err(StateError::InvalidTransition {
            incident_id: incident.id.clone(),
            from: incident.status,
            to,
        })
    }
}

/// Operator acknowledgement: `active → acknowledged`
pub fn acknowledge(incident: &mut Incident, now_ms: u64) -> Result<(), StateError> {
    guard(incident, IncidentStatus::Acknowledged)?;
    incident.status = IncidentStatus::Acknowledged;
    incident.acknowledged_at_ms = Some(now_ms);
    Ok(())
}

/// Bind a responder: `active|acknowledged → dispatched`
///
/// This is the only edge automatic matching may use; an already-dispatched
/// incident cannot pass through here again.
pub fn dispatch(incident: &mut Incident, responder_id: &str, now_ms: u64) -> Result<(), StateError> {
    if incident.status == IncidentStatus::Dispatched {
        return Err(StateError::InvalidTransition {
            incident_id: incident.id.clone(),
            from: incident.status,
            to: IncidentStatus::Dispatched,
        });
    }
    guard(incident, IncidentStatus::Dispatched)?;
    incident.status = IncidentStatus::Dispatched;
    incident.responder_id = Some(responder_id.to_string());
    incident.dispatched_at_ms = Some(now_ms);
    Ok(())
}

/// Operator reassignment: `dispatched → dispatched` with a different unit
///
/// Replaces the assigned responder and re-stamps the dispatch time. The
/// caller is responsible for freeing the previous unit.
pub fn reassign(incident: &mut Incident, responder_id: &str, now_ms: u64) -> Result<(), StateError> {
    if incident.status != IncidentStatus::Dispatched {
        return Err(StateError::InvalidTransition {
            incident_id: incident.id.clone(),
            from: incident.status,
            to: IncidentStatus::Dispatched,
        });
    }
    incident.status = IncidentStatus::Dispatched;
    incident.responder_id = Some(responder_id.to_string());
    incident.dispatched_at_ms = Some(now_ms);
    Ok(())
}

/// Responder resolution: `dispatched → resolved`
///
/// Only the assigned responder may resolve. Computes the response time in
/// minutes from trigger to resolution and returns it.
pub fn resolve(
    incident: &mut Incident,
    responder_id: &str,
    notes: Option<String>,
    now_ms: u64,
) -> Result<f64, StateError> {
    guard(incident, IncidentStatus::Resolved)?;
    match incident.responder_id.as_deref() {
        Some(assigned) if assigned == responder_id => {}
        _ => {
            return Err(StateError::ResponderMismatch {
                incident_id: incident.id.clone(),
                caller: responder_id.to_string(),
            })
        }
    }

    let response_minutes = metrics::response_time_minutes(incident.created_at_ms, now_ms);
    incident.status = IncidentStatus::Resolved;
    incident.resolved_at_ms = Some(now_ms);
    incident.response_time_minutes = Some(response_minutes);
    incident.resolution_notes = Some(notes.unwrap_or_else(|| "Resolved by responder".to_string()));
    Ok(response_minutes)
}

/// User cancellation: `active → false_alarm`
///
/// Rejected once a unit is rolling; cancelling a dispatched incident needs
/// an operator, not a silent status write.
pub fn cancel(incident: &mut Incident, now_ms: u64) -> Result<(), StateError> {
    guard(incident, IncidentStatus::FalseAlarm)?;
    incident.status = IncidentStatus::FalseAlarm;
    incident.resolved_at_ms = Some(now_ms);
    incident.resolution_notes = Some("Cancelled by user (false alarm)".to_string());
    Ok(())
}

/// Timeout expiry: `active|acknowledged|dispatched → expired`
pub fn expire(incident: &mut Incident, now_ms: u64) -> Result<(), StateError> {
    guard(incident, IncidentStatus::Expired)?;
    incident.status = IncidentStatus::Expired;
    incident.resolved_at_ms = Some(now_ms);
    incident.resolution_notes = Some("Expired without resolution".to_string());
    Ok(())
}
