// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Geofenced collectible items.

use super::position::Coordinate;

/// A fixed-location item athletes collect by passing within range.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectibleItem {
    pub id: i64,
    pub name: String,
    pub uid: String,
    pub value: i64,
    pub coordinate: Coordinate,
    /// Image URL
    pub picture: String,
}

/// Fields for creating an item.
#[derive(Debug, Clone)]
pub struct NewCollectibleItem {
    pub name: String,
    pub uid: String,
    pub value: i64,
    pub coordinate: Coordinate,
    pub picture: String,
}
