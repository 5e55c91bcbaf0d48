// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Proximity detection for collectible items.

use crate::models::{CollectibleItem, Coordinate};
use crate::services::distance::segment_distance;

/// An item is picked up when a position falls within this many meters of it.
pub const PROXIMITY_RADIUS_METERS: f64 = 100.0;

/// Find all items within pickup range of a coordinate.
pub fn items_in_range<'a>(
    coordinate: Coordinate,
    items: &'a [CollectibleItem],
) -> impl Iterator<Item = &'a CollectibleItem> + 'a {
    items
        .iter()
        .filter(move |item| segment_distance(coordinate, item.coordinate) <= PROXIMITY_RADIUS_METERS)
}
