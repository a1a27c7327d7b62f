//! Incident record and its closed status vocabularies
//!
//! One `Incident` is one emergency episode, from panic trigger to a
//! terminal state. Terminal incidents are retained for history, never
//! deleted.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Coordinate;

/// Incident lifecycle status
///
/// Transition legality lives in [`crate::state_machine`]; this enum only
/// names the states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Panic trigger received, awaiting attention
    Active,
    /// Operator has seen the incident
    Acknowledged,
    /// A responder is assigned and rolling
    Dispatched,
    /// Responder confirmed the user is safe
    Resolved,
    /// User cancelled before dispatch
    FalseAlarm,
    /// Timed out without resolution
    Expired,
}

impl IncidentStatus {
    /// Whether this status ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IncidentStatus::Resolved | IncidentStatus::FalseAlarm | IncidentStatus::Expired
        )
    }
}

/// Incident severity tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Immediate danger, life-threatening
    Critical,
    /// Urgent situation
    High,
    /// Potential threat
    Medium,
    /// Precautionary alert
    Low,
}

impl Default for Severity {
    /// Panic triggers default to high severity
    fn default() -> Self {
        Severity::High
    }
}

/// Trigger mechanism that raised the incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// User pressed the panic button
    Manual,
    /// Hold-to-stay button released
    DeadMansSwitch,
    /// Hardware key sequence
    HardwareKey,
    /// Voice keyword detected
    VoiceTrigger,
}

impl Default for TriggerKind {
    fn default() -> Self {
        TriggerKind::Manual
    }
}

/// A timestamped victim position sample preceding or during an incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Breadcrumb {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Sample timestamp in Unix milliseconds
    pub timestamp_ms: u64,
    /// Reported GPS accuracy in meters (optional)
    pub accuracy_m: Option<f32>,
}

/// A timestamped responder position sample while en route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrailPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Sample timestamp in Unix milliseconds
    pub timestamp_ms: u64,
    /// Reported speed in km/h (optional)
    pub speed_kmh: Option<f32>,
}

/// Device context captured at trigger time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    /// Device platform, e.g. "ios" or "android"
    pub platform: Option<String>,
    /// Installed app version
    pub app_version: Option<String>,
    /// Battery percentage (0-100)
    pub battery_percent: Option<u8>,
    /// Network type, e.g. "wifi", "cellular"
    pub network_type: Option<String>,
}

/// One emergency episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Unique incident identifier (uuid v4 text)
    pub id: String,
    /// User who triggered the panic
    pub user_id: String,
    /// Current latitude; moves with victim breadcrumbs
    pub latitude: f64,
    /// Current longitude; moves with victim breadcrumbs
    pub longitude: f64,
    /// Lifecycle status
    pub status: IncidentStatus,
    /// Severity tier
    pub severity: Severity,
    /// Trigger mechanism
    pub trigger: TriggerKind,
    /// Bounded victim position history, most recent retained
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Assigned responder, set once dispatched
    pub responder_id: Option<String>,
    /// Bounded responder position history while en route
    pub responder_trail: Vec<TrailPoint>,
    /// Service-area annotation, reporting only
    pub region: Option<String>,
    /// Straight-line ETA projection set at dispatch, in minutes
    pub eta_minutes: Option<f64>,
    /// Device context at trigger time
    pub device_info: Option<DeviceInfo>,
    /// How the incident was closed
    pub resolution_notes: Option<String>,
    /// Free-form extension data
    pub metadata: Option<serde_json::Value>,
    /// Trigger timestamp in Unix milliseconds
    pub created_at_ms: u64,
    /// Operator acknowledgement timestamp
    pub acknowledged_at_ms: Option<u64>,
    /// Dispatch timestamp
    pub dispatched_at_ms: Option<u64>,
    /// Resolution timestamp
    pub resolved_at_ms: Option<u64>,
    /// Derived trigger-to-resolution duration in minutes
    pub response_time_minutes: Option<f64>,
}

impl Incident {
    /// Create a new active incident at the trigger point
    pub fn new(user_id: String, latitude: f64, longitude: f64, created_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            latitude,
            longitude,
            status: IncidentStatus::Active,
            severity: Severity::default(),
            trigger: TriggerKind::default(),
            breadcrumbs: Vec::new(),
            responder_id: None,
            responder_trail: Vec::new(),
            region: None,
            eta_minutes: None,
            device_info: None,
            resolution_notes: None,
            metadata: None,
            created_at_ms,
            acknowledged_at_ms: None,
            dispatched_at_ms: None,
            resolved_at_ms: None,
            response_time_minutes: None,
        }
    }

    /// Current position as a coordinate
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Whether the incident has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Collaborator-facing snapshot of the incident
    pub fn snapshot(&self) -> IncidentSnapshot {
        IncidentSnapshot {
            id: self.id.clone(),
            status: self.status,
            severity: self.severity,
            latitude: self.latitude,
            longitude: self.longitude,
            responder_id: self.responder_id.clone(),
            eta_minutes: self.eta_minutes,
            created_at_ms: self.created_at_ms,
            dispatched_at_ms: self.dispatched_at_ms,
            resolved_at_ms: self.resolved_at_ms,
        }
    }
}

/// Incident snapshot produced for collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentSnapshot {
    /// Incident identifier
    pub id: String,
    /// Lifecycle status
    pub status: IncidentStatus,
    /// Severity tier
    pub severity: Severity,
    /// Current latitude
    pub latitude: f64,
    /// Current longitude
    pub longitude: f64,
    /// Assigned responder, if any
    pub responder_id: Option<String>,
    /// ETA projection in minutes, if dispatched
    pub eta_minutes: Option<f64>,
    /// Trigger timestamp
    pub created_at_ms: u64,
    /// Dispatch timestamp
    pub dispatched_at_ms: Option<u64>,
    /// Resolution timestamp
    pub resolved_at_ms: Option<u64>,
}
