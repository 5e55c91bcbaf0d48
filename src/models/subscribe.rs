// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Coach/athlete subscriptions.

/// Link between a coach and an athlete. Unique per pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscribe {
    pub id: i64,
    pub coach_id: i64,
    pub athlete_id: i64,
    /// Athlete's rating of the coach, 1..=5
    pub rating: Option<i64>,
}
