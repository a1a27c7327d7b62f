//! Request and report shapes consumed and produced by the coordinator
//!
//! These are the collaborator-facing field shapes; no wire protocol is
//! implied beyond them.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

use lifeline_domain::incident::{Breadcrumb, DeviceInfo, Severity, TriggerKind};

use crate::audit::DispatchPath;

/// Upstream-verified emergency profile attached to a creation request
///
/// The command center cannot authorize dispatch without a complete
/// profile; creation is rejected when any field is missing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmergencyProfile {
    /// National identity number
    pub national_id: Option<String>,
    /// Blood type
    pub blood_type: Option<String>,
    /// Registered home address
    pub address: Option<String>,
}

impl EmergencyProfile {
    /// Whether every required field is present and non-empty
    pub fn is_complete(&self) -> bool {
        [&self.national_id, &self.blood_type, &self.address]
            .iter()
            .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Panic trigger: incident creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncidentRequest {
    /// User who triggered the panic
    pub user_id: String,
    /// Trigger latitude
    pub latitude: f64,
    /// Trigger longitude
    pub longitude: f64,
    /// Position history captured before the trigger
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Trigger mechanism; defaults to manual
    pub trigger: Option<TriggerKind>,
    /// Severity override; panic triggers default to high
    pub severity: Option<Severity>,
    /// Device context at trigger time
    pub device_info: Option<DeviceInfo>,
    /// Free-form extension data
    pub metadata: Option<serde_json::Value>,
    /// Upstream profile precondition; creation is rejected without it
    pub profile: Option<EmergencyProfile>,
}

/// Responder location ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderPing {
    /// Reporting responder
    pub responder_id: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Report timestamp in Unix milliseconds
    pub timestamp_ms: u64,
    /// Reported speed in km/h (optional)
    pub speed_kmh: Option<f32>,
}

/// Outcome of a committed assignment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    /// Incident that was assigned
    pub incident_id: String,
    /// Responder that was bound
    pub responder_id: String,
    /// Distance at decision time in kilometers, when the unit had a
    /// position on record
    pub distance_km: Option<f64>,
    /// Straight-line ETA projection in minutes
    pub eta_minutes: Option<f64>,
    /// Decision path
    pub path: DispatchPath,
}

/// One row of the operator nearby-candidates report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateReport {
    /// Responder identifier
    pub responder_id: String,
    /// Distance from the incident in kilometers, two decimals
    pub distance_km: f64,
}
