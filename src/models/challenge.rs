// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Unlocked achievement records.

/// Unlocked challenge. At most one per (athlete, full_name).
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: i64,
    /// Athlete profile (athlete_info id) the challenge belongs to
    pub athlete_info_id: i64,
    /// User id behind that profile
    pub user_id: i64,
    pub full_name: String,
}
