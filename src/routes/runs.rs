// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run routes: CRUD plus the start/stop lifecycle actions.

use crate::db::{RunQuery, SortOrder};
use crate::error::{AppError, Result};
use crate::models::{Run, RunStatus, User};
use crate::routes::extract::ValidJson;
use crate::routes::{paginate, Listing};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/runs", get(list_runs).post(create_run))
        .route("/api/runs/{id}", get(get_run).delete(delete_run))
        .route("/api/runs/{id}/start", post(start_run))
        .route("/api/runs/{id}/stop", post(stop_run))
}

// ─── Representation ──────────────────────────────────────────

/// Compact owner details embedded in every run.
#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AthleteData {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
}

impl From<&User> for AthleteData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            last_name: user.last_name.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RunResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete: i64,
    pub comment: String,
    pub created_at: String,
    pub athlete_data: AthleteData,
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "\"init\" | \"in_progress\" | \"finished\"")
    )]
    pub status: RunStatus,
    pub distance: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub run_time_seconds: Option<i64>,
    pub speed: Option<f64>,
}

impl RunResponse {
    pub fn new(run: Run, athlete: &User) -> Self {
        Self {
            id: run.id,
            athlete: run.athlete_id,
            comment: run.comment,
            created_at: format_utc_rfc3339(run.created_at),
            athlete_data: AthleteData::from(athlete),
            status: run.status,
            distance: run.distance,
            run_time_seconds: run.run_time_seconds,
            speed: run.speed,
        }
    }
}

/// Attach the owner to a single run.
fn represent(state: &AppState, run: Run) -> Result<RunResponse> {
    let athlete = state
        .db
        .get_user(run.athlete_id)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", run.athlete_id)))?;
    Ok(RunResponse::new(run, &athlete))
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RunsQuery {
    status: Option<RunStatus>,
    /// Owner user id
    athlete: Option<i64>,
    /// `created_at` or `-created_at`
    ordering: Option<String>,
    page: Option<usize>,
    size: Option<usize>,
}

fn parse_ordering(ordering: Option<&str>) -> Result<Option<SortOrder>> {
    match ordering {
        None => Ok(None),
        Some("created_at") => Ok(Some(SortOrder::Ascending)),
        Some("-created_at") => Ok(Some(SortOrder::Descending)),
        Some(other) => Err(AppError::BadRequest(format!(
            "Invalid 'ordering' parameter: {}",
            other
        ))),
    }
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<Listing<RunResponse>>> {
    let query = RunQuery {
        status: params.status,
        athlete_id: params.athlete,
        created_at: parse_ordering(params.ordering.as_deref())?,
    };
    let runs = state.db.list_runs(&query)?;

    let mut owners: HashMap<i64, User> = HashMap::new();
    let mut responses = Vec::with_capacity(runs.len());
    for run in runs {
        if !owners.contains_key(&run.athlete_id) {
            let user = state.db.get_user(run.athlete_id)?.ok_or_else(|| {
                AppError::NotFound(format!("User {} not found", run.athlete_id))
            })?;
            owners.insert(run.athlete_id, user);
        }
        let owner = &owners[&run.athlete_id];
        responses.push(RunResponse::new(run, owner));
    }

    Ok(Json(paginate(responses, params.page, params.size)?))
}

// ─── CRUD ────────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct CreateRunRequest {
    athlete: i64,
    #[serde(default)]
    #[validate(length(max = 1000))]
    comment: String,
}

async fn create_run(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateRunRequest>,
) -> Result<(StatusCode, Json<RunResponse>)> {
    let athlete = state
        .db
        .get_user(body.athlete)?
        .ok_or_else(|| AppError::BadRequest(format!("User {} does not exist", body.athlete)))?;

    let run = state.db.create_run(athlete.id, &body.comment)?;
    tracing::info!(run_id = run.id, athlete_id = athlete.id, "Run created");

    Ok((StatusCode::CREATED, Json(RunResponse::new(run, &athlete))))
}

async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<Json<RunResponse>> {
    let run = state
        .db
        .get_run(run_id)?
        .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;
    Ok(Json(represent(&state, run)?))
}

async fn delete_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<StatusCode> {
    if !state.db.delete_run(run_id)? {
        return Err(AppError::NotFound(format!("Run {} not found", run_id)));
    }
    tracing::info!(run_id, "Run deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Lifecycle ───────────────────────────────────────────────

async fn start_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<Json<RunResponse>> {
    let run = state.runs.start(run_id).await?;
    Ok(Json(represent(&state, run)?))
}

async fn stop_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<Json<RunResponse>> {
    let finished = state.runs.stop(run_id).await?;
    Ok(Json(represent(&state, finished.run)?))
}
