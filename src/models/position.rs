// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! GPS position model.

use chrono::{DateTime, Utc};
use geo::Point;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components lie within geographic bounds.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Round both components to 4 decimal places (~11 m), the stored precision.
    pub fn to_stored_precision(self) -> Self {
        Self {
            latitude: (self.latitude * 10_000.0).round() / 10_000.0,
            longitude: (self.longitude * 10_000.0).round() / 10_000.0,
        }
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        // geo points are (x, y) = (lon, lat)
        Point::new(c.longitude, c.latitude)
    }
}

/// Stored GPS fix belonging to exactly one run.
#[derive(Debug, Clone)]
pub struct Position {
    pub id: i64,
    pub run_id: i64,
    pub coordinate: Coordinate,
    pub date_time: Option<DateTime<Utc>>,
    /// Cumulative kilometers along the run up to this fix
    pub distance: f64,
    /// Speed over the segment ending at this fix (m/s)
    pub speed: f64,
}

/// A position about to be appended to a run.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub run_id: i64,
    pub coordinate: Coordinate,
    pub date_time: Option<DateTime<Utc>>,
}
