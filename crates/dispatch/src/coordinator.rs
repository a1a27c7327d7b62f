//! Dispatch coordinator
//!
//! The single path through which a responder becomes bound to an
//! incident, used identically by automatic matching and manual operator
//! dispatch. The assignment protocol:
//!
//! 1. Automatic path: query nearest available candidates around the
//!    incident and iterate them in distance order. Manual path: the
//!    operator-chosen unit is the only candidate.
//! 2. Per candidate, attempt the atomic `available → reserved`
//!    compare-and-set on the roster. Exactly one of any set of racing
//!    callers wins a given unit.
//! 3. On reservation, drive the incident through `→ dispatched`. If the
//!    incident edge fails (cancelled concurrently, already taken), the
//!    reservation is rolled back and nothing is half-committed.
//! 4. On reservation failure, the automatic path advances to the next
//!    candidate; the manual path surfaces `ResponderUnavailable`.
//! 5. With the radius exhausted the incident stays `active` and
//!    `NoCandidateFound` is reported, retryable.
//!
//! Every committed assignment emits one audit event with the decision
//! path and distance.

#![warn(missing_docs)]

use std::sync::Arc;

use tracing::{debug, info, warn};

use lifeline_core::config::EngineConfig;
use lifeline_core::time::current_timestamp_ms;
use lifeline_domain::incident::{
    Breadcrumb, Incident, IncidentSnapshot, IncidentStatus, TrailPoint,
};
use lifeline_domain::metrics;
use lifeline_domain::responder::{Responder, ResponderStatus};
use lifeline_domain::state_machine::{self, StateError};
use lifeline_domain::trail::TrailRecorder;
use lifeline_domain::types::{Coordinate, Region};
use lifeline_spatial::{geodesic, IndexError, ResponderIndex};

use crate::audit::{AuditSink, DispatchEvent, DispatchPath};
use crate::board::IncidentBoard;
use crate::commands::{Assignment, CandidateReport, CreateIncidentRequest, ResponderPing};
use crate::error::DispatchError;

/// Statuses excluded when matching to available units
const NOT_AVAILABLE: [ResponderStatus; 3] = [
    ResponderStatus::OffDuty,
    ResponderStatus::Reserved,
    ResponderStatus::Busy,
];

/// Orchestrates incident lifecycle, matching, and exclusive assignment
pub struct DispatchCoordinator {
    board: IncidentBoard,
    index: Arc<ResponderIndex>,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
    regions: Vec<Region>,
}

impl DispatchCoordinator {
    /// Create a coordinator over a roster index and an audit sink
    pub fn new(index: Arc<ResponderIndex>, audit: Arc<dyn AuditSink>, config: EngineConfig) -> Self {
        Self {
            board: IncidentBoard::new(),
            index,
            audit,
            config,
            regions: Vec::new(),
        }
    }

    /// Attach region polygons used to annotate new incidents
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    /// The roster index this coordinator dispatches against
    pub fn index(&self) -> &Arc<ResponderIndex> {
        &self.index
    }

    /// Engine configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Incident intake
    // ------------------------------------------------------------------

    /// Create a new active incident from a panic trigger
    ///
    /// The upstream emergency-profile precondition must be attached and
    /// complete; creation fails with `ProfileIncomplete` otherwise.
    pub async fn create_incident(
        &self,
        request: CreateIncidentRequest,
    ) -> Result<Incident, DispatchError> {
        let complete = request
            .profile
            .as_ref()
            .is_some_and(|profile| profile.is_complete());
        if !complete {
            return Err(DispatchError::ProfileIncomplete {
                user_id: request.user_id,
            });
        }

        let now_ms = current_timestamp_ms();
        let mut incident =
            Incident::new(request.user_id, request.latitude, request.longitude, now_ms);
        if let Some(trigger) = request.trigger {
            incident.trigger = trigger;
        }
        if let Some(severity) = request.severity {
            incident.severity = severity;
        }
        incident.device_info = request.device_info;
        incident.metadata = request.metadata;

        let recorder = TrailRecorder::new(self.config.trails.breadcrumb_cap);
        let mut breadcrumbs = Vec::new();
        for crumb in request.breadcrumbs {
            breadcrumbs = recorder.append(&breadcrumbs, crumb);
        }
        incident.breadcrumbs = breadcrumbs;

        incident.region = self
            .regions
            .iter()
            .find(|region| geodesic::region_contains(region, incident.position()))
            .map(|region| region.name.clone());

        info!(
            incident_id = %incident.id,
            user_id = %incident.user_id,
            trigger = ?incident.trigger,
            "panic incident created"
        );
        self.board.insert(incident.clone()).await;
        Ok(incident)
    }

    /// Create an incident and immediately attempt automatic matching
    ///
    /// `NoCandidateFound` is a soft outcome here: the incident stays
    /// `active` for retry and no error is returned.
    pub async fn create_and_assign(
        &self,
        request: CreateIncidentRequest,
    ) -> Result<(Incident, Option<Assignment>), DispatchError> {
        let incident = self.create_incident(request).await?;
        match self.assign(&incident.id, None).await {
            Ok(assignment) => {
                let refreshed = self.board.get(&incident.id).await.unwrap_or(incident);
                Ok((refreshed, Some(assignment)))
            }
            Err(err @ DispatchError::NoCandidateFound { .. }) => {
                info!(incident_id = %incident.id, %err, "incident left active for retry");
                Ok((incident, None))
            }
            Err(err) => Err(err),
        }
    }

    // ------------------------------------------------------------------
    // Assignment protocol
    // ------------------------------------------------------------------

    /// Bind a responder to an incident
    ///
    /// With `candidate` absent the nearest available unit wins (automatic
    /// path); with it present only that unit is attempted (manual path).
    pub async fn assign(
        &self,
        incident_id: &str,
        candidate: Option<&str>,
    ) -> Result<Assignment, DispatchError> {
        let now_ms = current_timestamp_ms();
        match candidate {
            Some(responder_id) => self.assign_manual(incident_id, responder_id, now_ms).await,
            None => self.assign_auto(incident_id, now_ms).await,
        }
    }

    async fn assign_auto(
        &self,
        incident_id: &str,
        now_ms: u64,
    ) -> Result<Assignment, DispatchError> {
        let incident = self.dispatchable_incident(incident_id).await?;
        let radius_m = self.config.matching.search_radius_m;
        let candidates = self
            .index
            .query_nearest(
                incident.position(),
                None,
                radius_m,
                self.config.matching.candidate_limit,
                &NOT_AVAILABLE,
                now_ms,
            )
            .await;
        let considered = candidates.len();

        for candidate in candidates {
            match self.index.try_reserve(&candidate.responder_id).await {
                Ok(()) => {
                    return self
                        .commit_assignment(
                            incident_id,
                            &candidate.responder_id,
                            Some(candidate.distance_m),
                            DispatchPath::Auto,
                            now_ms,
                        )
                        .await;
                }
                Err(IndexError::NotAvailable { responder_id, .. }) => {
                    // Lost the race for this unit; the next candidate may
                    // still be free
                    debug!(%incident_id, %responder_id, "candidate taken, advancing");
                    continue;
                }
                Err(IndexError::NotFound(responder_id)) => {
                    debug!(%incident_id, %responder_id, "candidate vanished, advancing");
                    continue;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(DispatchError::NoCandidateFound {
            incident_id: incident_id.to_string(),
            radius_m,
            considered,
        })
    }

    async fn assign_manual(
        &self,
        incident_id: &str,
        responder_id: &str,
        now_ms: u64,
    ) -> Result<Assignment, DispatchError> {
        let incident = self.dispatchable_incident(incident_id).await?;

        // The operator chose this unit; no substitute on failure
        self.index.try_reserve(responder_id).await?;

        let distance_m = self
            .index
            .get(responder_id)
            .await
            .and_then(|responder| responder.position)
            .map(|position| geodesic::distance_meters(incident.position(), position));

        self.commit_assignment(incident_id, responder_id, distance_m, DispatchPath::Manual, now_ms)
            .await
    }

    /// Operator reassignment of an already-dispatched incident
    ///
    /// Reserves the new unit first, then moves the incident across the
    /// `dispatched → dispatched` edge and frees the previous unit. The
    /// automatic path can never reach this edge.
    pub async fn reassign(
        &self,
        incident_id: &str,
        responder_id: &str,
    ) -> Result<Assignment, DispatchError> {
        let now_ms = current_timestamp_ms();
        let incident = self
            .board
            .get(incident_id)
            .await
            .ok_or_else(|| DispatchError::IncidentNotFound(incident_id.to_string()))?;
        if incident.status != IncidentStatus::Dispatched {
            return Err(StateError::InvalidTransition {
                incident_id: incident_id.to_string(),
                from: incident.status,
                to: IncidentStatus::Dispatched,
            }
            .into());
        }
        let previous = incident.responder_id.clone();

        self.index.try_reserve(responder_id).await?;

        let distance_m = self
            .index
            .get(responder_id)
            .await
            .and_then(|responder| responder.position)
            .map(|position| geodesic::distance_meters(incident.position(), position));
        let eta_minutes = distance_m
            .map(|m| metrics::eta_minutes(m / 1_000.0, self.config.matching.assumed_speed_kmh));

        let moved = self
            .board
            .update(incident_id, |incident| {
                state_machine::reassign(incident, responder_id, now_ms)?;
                incident.eta_minutes = eta_minutes;
                Ok(())
            })
            .await;
        if let Err(err) = moved {
            warn!(%incident_id, %responder_id, %err, "reassignment failed, rolling back reservation");
            self.rollback_reservation(responder_id).await;
            return Err(err);
        }
        self.index.commit_reservation(responder_id).await?;

        if let Some(previous_id) = previous {
            if let Err(err) = self.index.release_assignment(&previous_id).await {
                warn!(responder_id = %previous_id, %err, "could not free previous responder");
            }
        }

        let distance_km = distance_m.map(|m| metrics::round2(m / 1_000.0));
        self.emit_dispatch(incident_id, responder_id, distance_km, DispatchPath::Manual, now_ms);
        Ok(Assignment {
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            distance_km,
            eta_minutes,
            path: DispatchPath::Manual,
        })
    }

    /// Reservation already held; commit the incident edge or roll back
    async fn commit_assignment(
        &self,
        incident_id: &str,
        responder_id: &str,
        distance_m: Option<f64>,
        path: DispatchPath,
        now_ms: u64,
    ) -> Result<Assignment, DispatchError> {
        let eta_minutes = distance_m
            .map(|m| metrics::eta_minutes(m / 1_000.0, self.config.matching.assumed_speed_kmh));

        let moved = self
            .board
            .update(incident_id, |incident| {
                state_machine::dispatch(incident, responder_id, now_ms)?;
                incident.eta_minutes = eta_minutes;
                Ok(())
            })
            .await;
        if let Err(err) = moved {
            warn!(%incident_id, %responder_id, %err, "incident edge failed, rolling back reservation");
            self.rollback_reservation(responder_id).await;
            return Err(err);
        }
        self.index.commit_reservation(responder_id).await?;

        let distance_km = distance_m.map(|m| metrics::round2(m / 1_000.0));
        self.emit_dispatch(incident_id, responder_id, distance_km, path, now_ms);
        Ok(Assignment {
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            distance_km,
            eta_minutes,
            path,
        })
    }

    async fn rollback_reservation(&self, responder_id: &str) {
        if let Err(err) = self.index.release_reservation(responder_id).await {
            warn!(%responder_id, %err, "reservation rollback failed");
        }
    }

    fn emit_dispatch(
        &self,
        incident_id: &str,
        responder_id: &str,
        distance_km: Option<f64>,
        path: DispatchPath,
        now_ms: u64,
    ) {
        info!(
            %incident_id,
            %responder_id,
            ?distance_km,
            path = path.as_str(),
            "responder dispatched"
        );
        if !self.config.audit.enabled {
            return;
        }
        let event = DispatchEvent {
            incident_id: incident_id.to_string(),
            responder_id: responder_id.to_string(),
            distance_km,
            path,
            timestamp_ms: now_ms,
        };
        if let Err(err) = self.audit.record_dispatch(&event) {
            // The assignment stands; audit durability never trades
            // against exclusivity
            warn!(%incident_id, %err, "audit sink rejected dispatch event");
        }
    }

    async fn dispatchable_incident(&self, incident_id: &str) -> Result<Incident, DispatchError> {
        let incident = self
            .board
            .get(incident_id)
            .await
            .ok_or_else(|| DispatchError::IncidentNotFound(incident_id.to_string()))?;
        if !matches!(
            incident.status,
            IncidentStatus::Active | IncidentStatus::Acknowledged
        ) {
            return Err(StateError::InvalidTransition {
                incident_id: incident_id.to_string(),
                from: incident.status,
                to: IncidentStatus::Dispatched,
            }
            .into());
        }
        Ok(incident)
    }

    // ------------------------------------------------------------------
    // Lifecycle commands
    // ------------------------------------------------------------------

    /// Operator acknowledgement of an active incident
    pub async fn acknowledge(&self, incident_id: &str) -> Result<(), DispatchError> {
        let now_ms = current_timestamp_ms();
        self.board
            .update(incident_id, |incident| {
                state_machine::acknowledge(incident, now_ms).map_err(Into::into)
            })
            .await
    }

    /// Assigned responder resolves the incident
    ///
    /// Returns the response time in minutes and folds it into the
    /// responder's rolling average.
    pub async fn resolve(
        &self,
        incident_id: &str,
        responder_id: &str,
        notes: Option<String>,
    ) -> Result<f64, DispatchError> {
        let now_ms = current_timestamp_ms();
        let minutes = self
            .board
            .update(incident_id, |incident| {
                state_machine::resolve(incident, responder_id, notes, now_ms).map_err(Into::into)
            })
            .await?;

        if let Err(err) = self.index.record_resolution(responder_id, minutes).await {
            warn!(%responder_id, %err, "resolution recorded but roster update failed");
        }
        info!(%incident_id, %responder_id, minutes, "incident resolved");
        Ok(minutes)
    }

    /// Originating user cancels an active incident (false alarm)
    ///
    /// Rejected once a unit is rolling.
    pub async fn cancel(&self, incident_id: &str, user_id: &str) -> Result<(), DispatchError> {
        let now_ms = current_timestamp_ms();
        self.board
            .update(incident_id, |incident| {
                if incident.user_id != user_id {
                    // Do not reveal other users' incidents
                    return Err(DispatchError::IncidentNotFound(incident_id.to_string()));
                }
                state_machine::cancel(incident, now_ms).map_err(Into::into)
            })
            .await
    }

    /// Expire non-terminal incidents older than the configured timeout
    ///
    /// Sweep entry point for an external scheduler; `now_ms` is the sweep
    /// instant. A dispatched incident's responder is returned to
    /// `available`. Returns the expired incident ids.
    pub async fn expire_overdue(&self, now_ms: u64) -> Vec<String> {
        let overdue = self
            .board
            .overdue(now_ms, self.config.matching.incident_timeout_ms())
            .await;
        let mut expired = Vec::new();

        for incident_id in overdue {
            let freed = self
                .board
                .update(&incident_id, |incident| {
                    let committed = (incident.status == IncidentStatus::Dispatched)
                        .then(|| incident.responder_id.clone())
                        .flatten();
                    state_machine::expire(incident, now_ms)?;
                    Ok(committed)
                })
                .await;

            match freed {
                Ok(committed) => {
                    info!(%incident_id, "incident expired");
                    if let Some(responder_id) = committed {
                        if let Err(err) = self.index.release_assignment(&responder_id).await {
                            warn!(%responder_id, %err, "could not free responder of expired incident");
                        }
                    }
                    expired.push(incident_id);
                }
                Err(err) => warn!(%incident_id, %err, "expiry skipped"),
            }
        }
        expired
    }

    // ------------------------------------------------------------------
    // Location streams
    // ------------------------------------------------------------------

    /// Victim breadcrumb: append to the bounded trail and move the
    /// incident's current point
    ///
    /// Only the originating user may append, and only while the incident
    /// is still `active`.
    pub async fn record_breadcrumb(
        &self,
        incident_id: &str,
        user_id: &str,
        breadcrumb: Breadcrumb,
    ) -> Result<(), DispatchError> {
        let recorder = TrailRecorder::new(self.config.trails.breadcrumb_cap);
        self.board
            .update(incident_id, |incident| {
                if incident.user_id != user_id {
                    return Err(DispatchError::IncidentNotFound(incident_id.to_string()));
                }
                if incident.status != IncidentStatus::Active {
                    return Err(DispatchError::IncidentNotActive {
                        incident_id: incident_id.to_string(),
                        status: incident.status,
                    });
                }
                incident.latitude = breadcrumb.latitude;
                incident.longitude = breadcrumb.longitude;
                incident.breadcrumbs = recorder.append(&incident.breadcrumbs, breadcrumb);
                Ok(())
            })
            .await
    }

    /// Responder location ping: update the roster and, when the unit is
    /// rolling to an incident, extend that incident's trail
    pub async fn record_responder_ping(&self, ping: ResponderPing) -> Result<(), DispatchError> {
        let position = Coordinate::new(ping.latitude, ping.longitude);
        self.index
            .upsert_position(&ping.responder_id, position, ping.timestamp_ms)
            .await?;

        if let Some(incident_id) = self
            .board
            .find_dispatched_by_responder(&ping.responder_id)
            .await
        {
            let recorder = TrailRecorder::new(self.config.trails.responder_trail_cap);
            let point = TrailPoint {
                latitude: ping.latitude,
                longitude: ping.longitude,
                timestamp_ms: ping.timestamp_ms,
                speed_kmh: ping.speed_kmh,
            };
            self.board
                .update(&incident_id, |incident| {
                    // The incident may have closed between lookup and lock
                    if incident.status == IncidentStatus::Dispatched {
                        incident.responder_trail =
                            recorder.append(&incident.responder_trail, point);
                    }
                    Ok(())
                })
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Console feeds
    // ------------------------------------------------------------------

    /// Ordered nearby available candidates for operator tooling
    pub async fn nearby_candidates(
        &self,
        incident_id: &str,
    ) -> Result<Vec<CandidateReport>, DispatchError> {
        let incident = self
            .board
            .get(incident_id)
            .await
            .ok_or_else(|| DispatchError::IncidentNotFound(incident_id.to_string()))?;
        let now_ms = current_timestamp_ms();
        let candidates = self
            .index
            .query_nearest(
                incident.position(),
                None,
                self.config.matching.nearby_radius_m,
                self.config.matching.report_limit,
                &NOT_AVAILABLE,
                now_ms,
            )
            .await;
        Ok(candidates
            .into_iter()
            .map(|candidate| CandidateReport {
                responder_id: candidate.responder_id,
                distance_km: metrics::round2(candidate.distance_m / 1_000.0),
            })
            .collect())
    }

    /// Snapshot of one incident
    pub async fn incident_snapshot(
        &self,
        incident_id: &str,
    ) -> Result<IncidentSnapshot, DispatchError> {
        self.board
            .get(incident_id)
            .await
            .map(|incident| incident.snapshot())
            .ok_or_else(|| DispatchError::IncidentNotFound(incident_id.to_string()))
    }

    /// Full record of one incident
    pub async fn incident(&self, incident_id: &str) -> Option<Incident> {
        self.board.get(incident_id).await
    }

    /// The user's most recent open incident
    pub async fn active_incident_for_user(&self, user_id: &str) -> Option<Incident> {
        self.board.active_for_user(user_id).await
    }

    /// All non-terminal incidents for the live map, newest first
    pub async fn live_incidents(&self) -> Vec<IncidentSnapshot> {
        self.board.live_snapshots().await
    }

    /// Roster snapshot for the live map
    pub async fn responder_map(&self) -> Vec<Responder> {
        self.index.roster_snapshot().await
    }
}
