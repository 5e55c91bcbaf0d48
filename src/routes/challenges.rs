// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unlocked challenge routes.

use crate::error::Result;
use crate::models::Challenge;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/challenges", get(list_challenges))
        .route("/api/challenges_summary", get(challenges_summary))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub full_name: String,
    /// User id of the athlete
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete: i64,
}

impl From<Challenge> for ChallengeResponse {
    fn from(c: Challenge) -> Self {
        Self {
            id: c.id,
            full_name: c.full_name,
            athlete: c.user_id,
        }
    }
}

#[derive(Deserialize)]
struct ChallengesQuery {
    /// User id
    athlete: Option<i64>,
}

async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChallengesQuery>,
) -> Result<Json<Vec<ChallengeResponse>>> {
    let challenges = state.db.list_challenges(params.athlete)?;
    Ok(Json(challenges.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeHolder {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub full_name: String,
    pub username: String,
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChallengeSummary {
    pub name_to_display: String,
    pub athletes: Vec<ChallengeHolder>,
}

/// Athletes grouped by the challenge they unlocked.
async fn challenges_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChallengeSummary>>> {
    let holders = state.db.challenge_holders()?;

    let mut groups: BTreeMap<String, Vec<ChallengeHolder>> = BTreeMap::new();
    for (name, user) in holders {
        groups.entry(name).or_default().push(ChallengeHolder {
            id: user.id,
            full_name: user.full_name(),
            username: user.username,
        });
    }

    let summary = groups
        .into_iter()
        .map(|(name_to_display, athletes)| ChallengeSummary {
            name_to_display,
            athletes,
        })
        .collect();

    Ok(Json(summary))
}
