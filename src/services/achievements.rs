// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge catalog and rule evaluation.
//!
//! Every rule is evaluated after each run completion. Unlocking is an
//! idempotent insert keyed on (athlete, rule name), so re-evaluating a rule
//! that already fired never produces a second record.

use crate::models::AthleteStats;

pub const TEN_RUNS: &str = "Сделай 10 Забегов!";
pub const FIFTY_KILOMETERS: &str = "Пробеги 50 километров!";
pub const TWO_KM_UNDER_TEN_MINUTES: &str = "2 километра за 10 минут!";

const TEN_RUNS_THRESHOLD: u32 = 10;
const FIFTY_KILOMETERS_THRESHOLD_KM: f64 = 50.0;
const FAST_RUN_MIN_KM: f64 = 2.0;
const FAST_RUN_MAX_SECONDS: i64 = 600;

/// A named achievement and the condition that unlocks it.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeRule {
    pub name: &'static str,
    pub unlocked: fn(&AthleteStats) -> bool,
}

/// The fixed achievement catalog.
pub const CATALOG: &[ChallengeRule] = &[
    // Fires at ten or more finished runs, not only at exactly ten. The
    // unique challenge key keeps the unlock single.
    ChallengeRule {
        name: TEN_RUNS,
        unlocked: |stats| stats.finished_runs >= TEN_RUNS_THRESHOLD,
    },
    ChallengeRule {
        name: FIFTY_KILOMETERS,
        unlocked: |stats| stats.total_distance_km >= FIFTY_KILOMETERS_THRESHOLD_KM,
    },
    ChallengeRule {
        name: TWO_KM_UNDER_TEN_MINUTES,
        unlocked: |stats| {
            stats.run_distance_km >= FAST_RUN_MIN_KM
                && stats
                    .run_time_seconds
                    .is_some_and(|secs| secs <= FAST_RUN_MAX_SECONDS)
        },
    },
];

/// Names of every catalog rule satisfied by `stats`.
pub fn evaluate(stats: &AthleteStats) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|rule| (rule.unlocked)(stats))
        .map(|rule| rule.name)
        .collect()
}
