//! In-memory incident board
//!
//! The board owns every incident record for the lifetime of the engine;
//! terminal incidents stay on the board for history. All read-modify-write
//! operations run under the board's write guard, which is what serializes
//! concurrent updates to one incident (the trail contract).

#![warn(missing_docs)]

use std::collections::HashMap;

use tokio::sync::RwLock;

use lifeline_domain::incident::{Incident, IncidentSnapshot, IncidentStatus};

use crate::error::DispatchError;

/// Shared incident store
#[derive(Debug, Default)]
pub struct IncidentBoard {
    incidents: RwLock<HashMap<String, Incident>>,
}

impl IncidentBoard {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new incident record
    pub async fn insert(&self, incident: Incident) {
        let mut incidents = self.incidents.write().await;
        incidents.insert(incident.id.clone(), incident);
    }

    /// Fetch a copy of one incident
    pub async fn get(&self, incident_id: &str) -> Option<Incident> {
        let incidents = self.incidents.read().await;
        incidents.get(incident_id).cloned()
    }

    /// Number of incidents on the board, terminal included
    pub async fn len(&self) -> usize {
        let incidents = self.incidents.read().await;
        incidents.len()
    }

    /// Whether the board holds no incidents
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply a mutation to one incident under the write guard
    ///
    /// The closure's error aborts the update; the incident is left exactly
    /// as the closure left it, so closures must not partially mutate
    /// before failing (the state machine guarantees this for transitions).
    pub async fn update<T>(
        &self,
        incident_id: &str,
        mutate: impl FnOnce(&mut Incident) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        let mut incidents = self.incidents.write().await;
        let incident = incidents
            .get_mut(incident_id)
            .ok_or_else(|| DispatchError::IncidentNotFound(incident_id.to_string()))?;
        mutate(incident)
    }

    /// Snapshots of all non-terminal incidents, newest first
    pub async fn live_snapshots(&self) -> Vec<IncidentSnapshot> {
        let incidents = self.incidents.read().await;
        let mut live: Vec<IncidentSnapshot> = incidents
            .values()
            .filter(|incident| !incident.is_terminal())
            .map(Incident::snapshot)
            .collect();
        live.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        live
    }

    /// The incident currently dispatched to a responder, if any
    pub async fn find_dispatched_by_responder(&self, responder_id: &str) -> Option<String> {
        let incidents = self.incidents.read().await;
        incidents
            .values()
            .find(|incident| {
                incident.status == IncidentStatus::Dispatched
                    && incident.responder_id.as_deref() == Some(responder_id)
            })
            .map(|incident| incident.id.clone())
    }

    /// The user's most recent non-terminal incident, if any
    pub async fn active_for_user(&self, user_id: &str) -> Option<Incident> {
        let incidents = self.incidents.read().await;
        incidents
            .values()
            .filter(|incident| incident.user_id == user_id && !incident.is_terminal())
            .max_by_key(|incident| incident.created_at_ms)
            .cloned()
    }

    /// Identifiers of non-terminal incidents older than `max_age_ms`
    pub async fn overdue(&self, now_ms: u64, max_age_ms: u64) -> Vec<String> {
        let incidents = self.incidents.read().await;
        incidents
            .values()
            .filter(|incident| {
                !incident.is_terminal()
                    && now_ms.saturating_sub(incident.created_at_ms) > max_age_ms
            })
            .map(|incident| incident.id.clone())
            .collect()
    }
}
