//! Shared geographic primitives

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Geographic coordinate in WGS84 decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude degrees
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Named service-area polygon, used only to annotate incidents for
/// reporting. Matching never depends on regions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    /// Region name, e.g. a district or precinct
    pub name: String,
    /// Boundary ring; first and last vertex need not repeat
    pub boundary: Vec<Coordinate>,
}
