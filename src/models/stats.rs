// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Athlete statistics used to evaluate challenge rules.
//!
//! These are derived from the athlete's finished runs at evaluation time,
//! never stored redundantly.

use crate::models::{Run, RunStatus};

/// Aggregates over an athlete's finished runs plus the run that just finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AthleteStats {
    /// Number of finished runs
    pub finished_runs: u32,
    /// Sum of finished-run distances (km)
    pub total_distance_km: f64,
    /// Distance of the run being evaluated (km)
    pub run_distance_km: f64,
    /// Elapsed time of the run being evaluated, when known
    pub run_time_seconds: Option<i64>,
}

impl AthleteStats {
    /// Build stats from a full run history, evaluating `current`.
    ///
    /// Unfinished runs in `history` are ignored.
    pub fn from_history<'a>(history: impl IntoIterator<Item = &'a Run>, current: &Run) -> Self {
        let mut stats = Self {
            run_distance_km: current.distance,
            run_time_seconds: current.run_time_seconds,
            ..Self::default()
        };

        for run in history
            .into_iter()
            .filter(|r| r.status == RunStatus::Finished)
        {
            stats.finished_runs += 1;
            stats.total_distance_km += run.distance;
        }

        stats
    }
}
