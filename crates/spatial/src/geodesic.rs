//! Geodesic utilities over WGS84 degrees
//!
//! Coordinates are WGS84 latitude/longitude, so distances use the
//! great-circle (haversine) formula, never planar math.

#![warn(missing_docs)]

use geo::{Contains, HaversineDistance, LineString, Point, Polygon};
use lifeline_domain::types::{Coordinate, Region};

/// Great-circle distance between two coordinates, in meters
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    // geo points are (x, y) = (lon, lat)
    let from = Point::new(a.lon, a.lat);
    let to = Point::new(b.lon, b.lat);
    from.haversine_distance(&to)
}

/// Great-circle distance between two coordinates, in kilometers
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    distance_meters(a, b) / 1_000.0
}

/// Whether a point lies inside a boundary ring
///
/// Rings with fewer than three vertices contain nothing.
pub fn point_in_polygon(point: Coordinate, ring: &[Coordinate]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let exterior: Vec<(f64, f64)> = ring.iter().map(|c| (c.lon, c.lat)).collect();
    let polygon = Polygon::new(LineString::from(exterior), vec![]);
    polygon.contains(&Point::new(point.lon, point.lat))
}

/// Whether a region's boundary contains a point
pub fn region_contains(region: &Region, point: Coordinate) -> bool {
    point_in_polygon(point, &region.boundary)
}
