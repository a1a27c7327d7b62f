//! Live responder roster and nearest-candidate queries
//!
//! The index is the single owner of shared responder state. Position
//! upserts are last-write-wins keyed on the reported timestamp, and the
//! `available → reserved` compare-and-set here is the atomic step of the
//! exclusivity protocol: two concurrent reservation attempts for the same
//! responder can never both succeed, because both run under the same
//! write guard.

#![warn(missing_docs)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use lifeline_domain::metrics;
use lifeline_domain::responder::{Responder, ResponderKind, ResponderStatus};
use lifeline_domain::types::Coordinate;
use thiserror::Error;

use crate::geodesic;

/// Roster/index errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// Responder is not registered in the roster
    #[error("Responder not found: {0}")]
    NotFound(String),

    /// Reservation target was not available at attempt time
    #[error("Responder {responder_id} is not available (status {status:?})")]
    NotAvailable {
        /// Responder identifier
        responder_id: String,
        /// Status observed at the attempt
        status: ResponderStatus,
    },

    /// A protocol step found the responder in an unexpected status
    #[error("Responder {responder_id} is {found:?}, expected {expected:?}")]
    UnexpectedStatus {
        /// Responder identifier
        responder_id: String,
        /// Status the protocol step requires
        expected: ResponderStatus,
        /// Status actually observed
        found: ResponderStatus,
    },
}

/// A matching candidate with its distance from the query point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Responder identifier
    pub responder_id: String,
    /// Great-circle distance from the query point, in meters
    pub distance_m: f64,
}

/// Live responder roster with spatial queries and the reservation guard
#[derive(Debug)]
pub struct ResponderIndex {
    roster: RwLock<HashMap<String, Responder>>,
    freshness_window_ms: u64,
}

impl ResponderIndex {
    /// Create an empty index with the given position freshness window
    pub fn new(freshness_window_ms: u64) -> Self {
        Self {
            roster: RwLock::new(HashMap::new()),
            freshness_window_ms,
        }
    }

    /// The configured freshness window in milliseconds
    pub fn freshness_window_ms(&self) -> u64 {
        self.freshness_window_ms
    }

    /// Add or replace a roster record
    pub async fn register(&self, responder: Responder) {
        let mut roster = self.roster.write().await;
        roster.insert(responder.id.clone(), responder);
    }

    /// Fetch a copy of one roster record
    pub async fn get(&self, responder_id: &str) -> Option<Responder> {
        let roster = self.roster.read().await;
        roster.get(responder_id).cloned()
    }

    /// Copy of the full roster, for the operator live map
    pub async fn roster_snapshot(&self) -> Vec<Responder> {
        let roster = self.roster.read().await;
        roster.values().cloned().collect()
    }

    /// Record a responder's last known location
    ///
    /// Last-write-wins keyed on the reported timestamp: a report older
    /// than the stored one is dropped, equal timestamps resolve by
    /// arrival order. Safe under concurrent callers; the write guard
    /// serializes same-responder races.
    pub async fn upsert_position(
        &self,
        responder_id: &str,
        position: Coordinate,
        timestamp_ms: u64,
    ) -> Result<(), IndexError> {
        let mut roster = self.roster.write().await;
        let responder = roster
            .get_mut(responder_id)
            .ok_or_else(|| IndexError::NotFound(responder_id.to_string()))?;

        if let Some(stored_ts) = responder.position_timestamp_ms {
            if timestamp_ms < stored_ts {
                debug!(
                    responder_id,
                    stored_ts, timestamp_ms, "dropping out-of-order position report"
                );
                return Ok(());
            }
        }
        responder.position = Some(position);
        responder.position_timestamp_ms = Some(timestamp_ms);
        Ok(())
    }

    /// Administrative status change (on-duty / off-duty)
    ///
    /// The reservation protocol owns `Reserved` and `Busy`; forcing a
    /// responder out of those states here is logged because it can free a
    /// unit the coordinator believes is committed.
    pub async fn set_status(
        &self,
        responder_id: &str,
        status: ResponderStatus,
    ) -> Result<(), IndexError> {
        let mut roster = self.roster.write().await;
        let responder = roster
            .get_mut(responder_id)
            .ok_or_else(|| IndexError::NotFound(responder_id.to_string()))?;

        if matches!(
            responder.status,
            ResponderStatus::Reserved | ResponderStatus::Busy
        ) {
            warn!(
                responder_id,
                from = ?responder.status,
                to = ?status,
                "administrative status override of a committed responder"
            );
        }
        responder.status = status;
        Ok(())
    }

    /// The exclusivity compare-and-set: `available → reserved`
    ///
    /// Succeeds only if the responder is observed `available` at this
    /// moment. Under N concurrent attempts for the same unit, exactly one
    /// caller sees success.
    pub async fn try_reserve(&self, responder_id: &str) -> Result<(), IndexError> {
        let mut roster = self.roster.write().await;
        let responder = roster
            .get_mut(responder_id)
            .ok_or_else(|| IndexError::NotFound(responder_id.to_string()))?;

        if responder.status != ResponderStatus::Available {
            return Err(IndexError::NotAvailable {
                responder_id: responder_id.to_string(),
                status: responder.status,
            });
        }
        responder.status = ResponderStatus::Reserved;
        Ok(())
    }

    /// Commit a reservation: `reserved → busy`
    pub async fn commit_reservation(&self, responder_id: &str) -> Result<(), IndexError> {
        self.transition(responder_id, ResponderStatus::Reserved, ResponderStatus::Busy)
            .await
    }

    /// Roll a reservation back: `reserved → available`
    pub async fn release_reservation(&self, responder_id: &str) -> Result<(), IndexError> {
        self.transition(
            responder_id,
            ResponderStatus::Reserved,
            ResponderStatus::Available,
        )
        .await
    }

    /// Free a committed responder without metrics: `busy → available`
    ///
    /// Used when an incident expires under a rolling unit or an operator
    /// reassigns it away.
    pub async fn release_assignment(&self, responder_id: &str) -> Result<(), IndexError> {
        self.transition(responder_id, ResponderStatus::Busy, ResponderStatus::Available)
            .await
    }

    /// Record a resolution: `busy → available` plus metrics fold
    ///
    /// Increments the handled count and folds the latest response time
    /// into the rolling average.
    pub async fn record_resolution(
        &self,
        responder_id: &str,
        response_minutes: f64,
    ) -> Result<(), IndexError> {
        let mut roster = self.roster.write().await;
        let responder = roster
            .get_mut(responder_id)
            .ok_or_else(|| IndexError::NotFound(responder_id.to_string()))?;

        if responder.status != ResponderStatus::Busy {
            return Err(IndexError::UnexpectedStatus {
                responder_id: responder_id.to_string(),
                expected: ResponderStatus::Busy,
                found: responder.status,
            });
        }
        responder.average_response_minutes = Some(metrics::rolling_average(
            responder.average_response_minutes,
            responder.handled_count,
            response_minutes,
        ));
        responder.handled_count += 1;
        responder.status = ResponderStatus::Available;
        Ok(())
    }

    async fn transition(
        &self,
        responder_id: &str,
        expected: ResponderStatus,
        to: ResponderStatus,
    ) -> Result<(), IndexError> {
        let mut roster = self.roster.write().await;
        let responder = roster
            .get_mut(responder_id)
            .ok_or_else(|| IndexError::NotFound(responder_id.to_string()))?;

        if responder.status != expected {
            return Err(IndexError::UnexpectedStatus {
                responder_id: responder_id.to_string(),
                expected,
                found: responder.status,
            });
        }
        responder.status = to;
        Ok(())
    }

    /// Nearest candidates around a point, closest first
    ///
    /// Considers only responders whose status is not in `exclude`, whose
    /// kind matches `kind` (when given), and whose last position is
    /// inside the freshness window at `now_ms`. Responders that have
    /// never pinged are skipped. Stale candidates are filtered silently
    /// and surface only in the candidate count.
    pub async fn query_nearest(
        &self,
        origin: Coordinate,
        kind: Option<ResponderKind>,
        radius_m: f64,
        limit: usize,
        exclude: &[ResponderStatus],
        now_ms: u64,
    ) -> Vec<Candidate> {
        let roster = self.roster.read().await;
        let mut stale = 0usize;
        let mut candidates: Vec<Candidate> = Vec::new();

        for responder in roster.values() {
            if exclude.contains(&responder.status) {
                continue;
            }
            if let Some(required) = kind {
                if responder.kind != required {
                    continue;
                }
            }
            let position = match responder.position {
                Some(position) => position,
                None => continue,
            };
            if responder.is_stale(now_ms, self.freshness_window_ms) {
                stale += 1;
                continue;
            }
            let distance_m = geodesic::distance_meters(origin, position);
            if distance_m > radius_m {
                continue;
            }
            candidates.push(Candidate {
                responder_id: responder.id.clone(),
                distance_m,
            });
        }

        if stale > 0 {
            debug!(stale, "candidates dropped for stale positions");
        }

        candidates.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        candidates
    }
}
