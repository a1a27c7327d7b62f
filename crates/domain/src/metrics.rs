//! Response-time and ETA derivations
//!
//! All figures are reported with two-decimal rounding, matching the
//! console's display precision.

#![warn(missing_docs)]

/// Round to two decimals for reporting
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Trigger-to-resolution duration in minutes
pub fn response_time_minutes(created_at_ms: u64, resolved_at_ms: u64) -> f64 {
    let elapsed_ms = resolved_at_ms.saturating_sub(created_at_ms);
    round2(elapsed_ms as f64 / 60_000.0)
}

/// Incremental rolling average: `(old_avg * n + latest) / (n + 1)`
///
/// `handled` is the count of resolutions folded into `old_avg` so far.
pub fn rolling_average(old_avg: Option<f64>, handled: u32, latest_minutes: f64) -> f64 {
    let average = match old_avg {
        Some(avg) => (avg * handled as f64 + latest_minutes) / (handled as f64 + 1.0),
        None => latest_minutes,
    };
    round2(average)
}

/// Straight-line ETA projection in minutes
///
/// Distance over an assumed constant speed; an approximation, never a
/// routed estimate. Speeds at or below zero are floored to walking pace.
pub fn eta_minutes(distance_km: f64, assumed_speed_kmh: f64) -> f64 {
    let speed_kmh = assumed_speed_kmh.max(4.0);
    round2(distance_km / speed_kmh * 60.0)
}
