// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geodesic distance engine.
//!
//! Converts ordered GPS fixes into travelled distance and per-segment speed
//! using distances on the WGS84 ellipsoid. Inputs are assumed to be validated
//! coordinates; range checks happen at ingestion.

use crate::models::{Coordinate, Position};
use chrono::{DateTime, Utc};
use geo::{Distance, Geodesic, Point};

/// Fewest positions from which a path length can be computed.
pub const MIN_PATH_POSITIONS: usize = 2;

/// Distance between two coordinates along the Earth's surface, in meters.
///
/// Symmetric, and zero exactly when `a == b`.
pub fn segment_distance(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }
    // Evaluate in a canonical order so swapping the arguments is bit-identical.
    let (from, to) = if (a.latitude, a.longitude) <= (b.latitude, b.longitude) {
        (a, b)
    } else {
        (b, a)
    };
    Geodesic.distance(Point::from(from), Point::from(to))
}

/// Total length of an ordered path, in kilometers (unrounded).
///
/// Returns 0 for empty and single-point paths.
pub fn path_distance(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| segment_distance(pair[0], pair[1]))
        .sum::<f64>()
        / 1000.0
}

/// Path length of a finished run in kilometers, rounded to 3 places.
///
/// `None` when there are fewer than [`MIN_PATH_POSITIONS`] points.
pub fn run_distance(points: &[Coordinate]) -> Option<f64> {
    if points.len() < MIN_PATH_POSITIONS {
        return None;
    }
    Some(round_to(path_distance(points), 3))
}

/// Speed over a segment in m/s. Zero when elapsed time is unknown or not positive.
pub fn segment_speed(meters: f64, elapsed_seconds: Option<f64>) -> f64 {
    match elapsed_seconds {
        Some(secs) if secs > 0.0 => meters / secs,
        _ => 0.0,
    }
}

/// Metrics stored on a newly ingested position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMetrics {
    /// Cumulative kilometers up to the new fix, rounded to 2 places
    pub distance_km: f64,
    /// Speed since the previous fix in m/s, rounded to 2 places
    pub speed: f64,
}

/// Compute metrics for a new fix relative to the previous fix of the same run.
///
/// The first fix of a run has zero distance and speed.
pub fn segment_metrics(
    previous: Option<&Position>,
    coordinate: Coordinate,
    date_time: Option<DateTime<Utc>>,
) -> SegmentMetrics {
    let Some(prev) = previous else {
        return SegmentMetrics {
            distance_km: 0.0,
            speed: 0.0,
        };
    };

    let meters = segment_distance(prev.coordinate, coordinate);
    let elapsed = match (prev.date_time, date_time) {
        (Some(start), Some(end)) => {
            Some((end - start).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0)
        }
        _ => None,
    };

    SegmentMetrics {
        distance_km: round_to(prev.distance + meters / 1000.0, 2),
        speed: round_to(segment_speed(meters, elapsed), 2),
    }
}

/// Round half away from zero to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
