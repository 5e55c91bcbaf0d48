// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod challenge;
pub mod item;
pub mod position;
pub mod run;
pub mod stats;
pub mod subscribe;
pub mod user;

pub use challenge::Challenge;
pub use item::{CollectibleItem, NewCollectibleItem};
pub use position::{Coordinate, NewPosition, Position};
pub use run::{Run, RunAction, RunStatus, TransitionError};
pub use stats::AthleteStats;
pub use subscribe::Subscribe;
pub use user::{AthleteInfo, NewUser, User};
