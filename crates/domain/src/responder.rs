//! Responder record and availability vocabulary
//!
//! A `Responder` is one field unit. The live roster is owned by the
//! responder index in `lifeline-spatial`; this module only defines the
//! record and its derived helpers.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::types::Coordinate;

/// Responder availability status
///
/// `Reserved` and `Busy` bind the unit to at most one incident at a time;
/// the dispatch coordinator's reservation protocol enforces that.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponderStatus {
    /// Not on shift, never matched
    OffDuty,
    /// Ready to accept an incident
    Available,
    /// A dispatch attempt is in flight but not yet committed
    Reserved,
    /// Committed to an incident
    Busy,
}

/// Responder type/capability tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponderKind {
    /// Police unit
    Police,
    /// Medical unit
    Paramedic,
    /// Private security unit
    Security,
    /// Fire brigade unit
    Firefighter,
    /// Search-and-rescue unit
    SearchRescue,
}

/// One field unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
    /// Unique responder identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Type/capability tag
    pub kind: ResponderKind,
    /// Availability status
    pub status: ResponderStatus,
    /// Last reported position; absent until the first ping
    pub position: Option<Coordinate>,
    /// Timestamp of the last position report, Unix milliseconds
    pub position_timestamp_ms: Option<u64>,
    /// Service-area annotation
    pub region: Option<String>,
    /// Lifetime count of handled incidents
    pub handled_count: u32,
    /// Rolling average response time in minutes
    pub average_response_minutes: Option<f64>,
}

impl Responder {
    /// Create a new off-duty responder with no known position
    pub fn new(id: String, name: String, kind: ResponderKind) -> Self {
        Self {
            id,
            name,
            kind,
            status: ResponderStatus::OffDuty,
            position: None,
            position_timestamp_ms: None,
            region: None,
            handled_count: 0,
            average_response_minutes: None,
        }
    }

    /// Age of the last position report, or `None` before the first ping
    pub fn position_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.position_timestamp_ms
            .map(|ts| now_ms.saturating_sub(ts))
    }

    /// Whether the last position is too old to match against
    ///
    /// A responder with no position yet is always stale. Clock skew in the
    /// other direction (report from the future) is not treated as stale.
    pub fn is_stale(&self, now_ms: u64, freshness_window_ms: u64) -> bool {
        match self.position_age_ms(now_ms) {
            Some(age_ms) => age_ms > freshness_window_ms,
            None => true,
        }
    }
}
