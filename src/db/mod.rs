// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite).

pub mod sqlite;

pub use sqlite::{Database, FinishedRun, RunQuery, SortOrder, UserQuery, UserWithStats};

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const ATHLETE_INFO: &str = "athlete_info";
    pub const RUNS: &str = "runs";
    pub const POSITIONS: &str = "positions";
    /// Unlocked achievements (unique per athlete profile and name)
    pub const CHALLENGES: &str = "challenges";
    pub const COLLECTIBLE_ITEMS: &str = "collectible_items";
    /// Which user collected which item (at most once per pair)
    pub const ITEM_COLLECTIONS: &str = "item_collections";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
}
