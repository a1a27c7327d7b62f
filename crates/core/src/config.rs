//! Configuration management for the Lifeline dispatch engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Matching and freshness settings
    pub matching: MatchingConfig,
    /// Trail retention caps
    pub trails: TrailConfig,
    /// Dispatch audit sink settings
    pub audit: AuditConfig,
}

/// Candidate matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Maximum search radius for automatic matching, in meters
    pub search_radius_m: f64,
    /// Radius for operator nearby-candidate reports, in meters
    pub nearby_radius_m: f64,
    /// Maximum candidates considered per automatic assignment attempt
    pub candidate_limit: usize,
    /// Candidates included in the operator nearby report
    pub report_limit: usize,
    /// Maximum age of a responder position before it is excluded, in seconds
    pub freshness_window_secs: u64,
    /// Assumed responder travel speed for ETA projection, in km/h
    pub assumed_speed_kmh: f64,
    /// Age after which a non-terminal incident is eligible for expiry, in seconds
    pub incident_timeout_secs: u64,
}

/// Trail retention caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailConfig {
    /// Maximum retained victim breadcrumbs per incident
    pub breadcrumb_cap: usize,
    /// Maximum retained responder trail points per incident
    pub responder_trail_cap: usize,
}

/// Dispatch audit sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether dispatch decisions are recorded at all
    pub enabled: bool,
    /// Path to the SQLite audit database; in-memory buffer when absent
    pub db_path: Option<String>,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Built-in defaults, matching field deployment settings
    pub fn default_config() -> Self {
        Self {
            matching: MatchingConfig {
                search_radius_m: 50_000.0,
                nearby_radius_m: 5_000.0,
                candidate_limit: 10,
                report_limit: 3,
                freshness_window_secs: 300,
                assumed_speed_kmh: 40.0,
                incident_timeout_secs: 1_800,
            },
            trails: TrailConfig {
                breadcrumb_cap: 30,
                responder_trail_cap: 50,
            },
            audit: AuditConfig {
                enabled: true,
                db_path: None,
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl MatchingConfig {
    /// Freshness window in milliseconds
    pub fn freshness_window_ms(&self) -> u64 {
        self.freshness_window_secs * 1_000
    }

    /// Incident expiry age in milliseconds
    pub fn incident_timeout_ms(&self) -> u64 {
        self.incident_timeout_secs * 1_000
    }
}
