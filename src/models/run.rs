// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Run model and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a run.
///
/// `Init` → `InProgress` → `Finished`. No state is skipped and no
/// transition is reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Init,
    InProgress,
    Finished,
}

/// Athlete-initiated lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Start,
    Stop,
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    CannotStart,
    CannotStop,
    NotRecording,
}

impl TransitionError {
    /// Client-facing message for this rejection.
    pub fn message(self) -> &'static str {
        match self {
            TransitionError::CannotStart => "Invalid run status for starting.",
            TransitionError::CannotStop => "Invalid run status for stopping.",
            TransitionError::NotRecording => "Run must be in progress to record a position.",
        }
    }
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for TransitionError {}

impl RunStatus {
    /// Apply a lifecycle action, returning the next status.
    pub fn transition(self, action: RunAction) -> Result<RunStatus, TransitionError> {
        match (self, action) {
            (RunStatus::Init, RunAction::Start) => Ok(RunStatus::InProgress),
            (RunStatus::InProgress, RunAction::Stop) => Ok(RunStatus::Finished),
            (_, RunAction::Start) => Err(TransitionError::CannotStart),
            (_, RunAction::Stop) => Err(TransitionError::CannotStop),
        }
    }

    /// Positions may only be appended while the run is in progress.
    pub fn accepts_positions(self) -> Result<(), TransitionError> {
        if self == RunStatus::InProgress {
            Ok(())
        } else {
            Err(TransitionError::NotRecording)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Init => "init",
            RunStatus::InProgress => "in_progress",
            RunStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(RunStatus::Init),
            "in_progress" => Ok(RunStatus::InProgress),
            "finished" => Ok(RunStatus::Finished),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// Stored run record.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: i64,
    /// Owning athlete (user id)
    pub athlete_id: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Path length in kilometers, rounded to 3 places once finished
    pub distance: f64,
    /// Seconds between the first and last position timestamps
    pub run_time_seconds: Option<i64>,
    /// Mean of the per-position speeds (m/s)
    pub speed: Option<f64>,
}
