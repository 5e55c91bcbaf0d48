// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User, athlete profile and coach subscription routes.

use crate::db::{SortOrder, UserQuery, UserWithStats};
use crate::error::{AppError, Result};
use crate::models::{AthleteInfo, NewUser, Subscribe, User};
use crate::routes::extract::ValidJson;
use crate::routes::items::ItemResponse;
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
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user))
        .route(
            "/api/athlete_info/{user_id}",
            get(get_athlete_info).put(update_athlete_info),
        )
        .route("/api/subscribe_to_coach/{coach_id}", post(subscribe_to_coach))
        .route("/api/rate_coach/{coach_id}", post(rate_coach))
}

fn require_user(state: &AppState, user_id: i64) -> Result<User> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

// ─── Users ───────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: String,
    /// `coach` or `athlete`
    #[serde(rename = "type")]
    pub kind: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub runs_finished: i64,
    /// Average rating as a coach
    pub rating: Option<f64>,
}

impl From<UserWithStats> for UserSummary {
    fn from(u: UserWithStats) -> Self {
        Self {
            id: u.user.id,
            kind: u.user.kind().to_string(),
            username: u.user.username,
            first_name: u.user.first_name,
            last_name: u.user.last_name,
            date_joined: format_utc_rfc3339(u.user.date_joined),
            runs_finished: u.runs_finished,
            rating: u.rating,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserDetail {
    #[serde(flatten)]
    pub summary: UserSummary,
    /// Items this user has collected
    pub items: Vec<ItemResponse>,
    /// Subscribed athletes (coaches only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<number> | null"))]
    pub athletes: Option<Vec<i64>>,
    /// Coach user id (athletes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub coach: Option<Option<i64>>,
}

#[derive(Deserialize)]
struct UsersQuery {
    /// `coach` or `athlete`
    #[serde(rename = "type")]
    kind: Option<String>,
    /// Case-insensitive substring of first or last name
    search: Option<String>,
    /// `date_joined` or `-date_joined`
    ordering: Option<String>,
    page: Option<usize>,
    size: Option<usize>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UsersQuery>,
) -> Result<Json<Listing<UserSummary>>> {
    let is_staff = match params.kind.as_deref() {
        None => None,
        Some("coach") => Some(true),
        Some("athlete") => Some(false),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Invalid 'type' parameter: {}",
                other
            )))
        }
    };
    let date_joined = match params.ordering.as_deref() {
        None => None,
        Some("date_joined") => Some(SortOrder::Ascending),
        Some("-date_joined") => Some(SortOrder::Descending),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Invalid 'ordering' parameter: {}",
                other
            )))
        }
    };

    let mut users = state.db.list_users(&UserQuery {
        is_staff,
        date_joined,
    })?;

    if let Some(needle) = params.search.as_deref().map(str::to_lowercase) {
        users.retain(|u| {
            u.user.first_name.to_lowercase().contains(&needle)
                || u.user.last_name.to_lowercase().contains(&needle)
        });
    }

    let summaries = users.into_iter().map(UserSummary::from).collect();
    Ok(Json(paginate(summaries, params.page, params.size)?))
}

#[derive(Deserialize, Validate)]
struct CreateUserRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1 to 150 characters."))]
    username: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    last_name: String,
    #[serde(default)]
    is_staff: bool,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>)> {
    let user = state.db.create_user(&NewUser {
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
        is_staff: body.is_staff,
        is_superuser: false,
    })?;
    tracing::info!(user_id = user.id, kind = user.kind(), "User created");

    let stats = state
        .db
        .get_user_with_stats(user.id)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;
    Ok((StatusCode::CREATED, Json(stats.into())))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserDetail>> {
    let stats = state
        .db
        .get_user_with_stats(user_id)?
        .filter(|u| !u.user.is_superuser)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    let items = state
        .db
        .items_collected_by(user_id)?
        .into_iter()
        .map(ItemResponse::from)
        .collect();

    let (athletes, coach) = if stats.user.is_coach() {
        (Some(state.db.athletes_of_coach(user_id)?), None)
    } else {
        (None, Some(state.db.coach_of_athlete(user_id)?))
    };

    Ok(Json(UserDetail {
        summary: stats.into(),
        items,
        athletes,
        coach,
    }))
}

// ─── Athlete Profile ─────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AthleteInfoResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub user_id: i64,
    pub goals: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub weight: Option<i64>,
}

impl From<AthleteInfo> for AthleteInfoResponse {
    fn from(info: AthleteInfo) -> Self {
        Self {
            user_id: info.user_id,
            goals: info.goals,
            weight: info.weight,
        }
    }
}

async fn get_athlete_info(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<AthleteInfoResponse>> {
    require_user(&state, user_id)?;
    let info = state.db.get_or_create_athlete_info(user_id)?;
    Ok(Json(info.into()))
}

#[derive(Deserialize, Validate)]
struct UpdateAthleteInfoRequest {
    goals: Option<String>,
    #[validate(range(
        exclusive_min = 0,
        exclusive_max = 900,
        message = "Weight must be greater than 0 and less than 900."
    ))]
    weight: Option<i64>,
}

async fn update_athlete_info(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    ValidJson(body): ValidJson<UpdateAthleteInfoRequest>,
) -> Result<(StatusCode, Json<AthleteInfoResponse>)> {
    require_user(&state, user_id)?;
    let info = state
        .db
        .upsert_athlete_info(user_id, body.goals.as_deref(), body.weight)?;
    tracing::debug!(user_id, weight = ?info.weight, "Athlete profile updated");
    Ok((StatusCode::CREATED, Json(info.into())))
}

// ─── Subscriptions ───────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscribeResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub coach: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub rating: Option<i64>,
}

impl From<Subscribe> for SubscribeResponse {
    fn from(s: Subscribe) -> Self {
        Self {
            id: s.id,
            coach: s.coach_id,
            athlete: s.athlete_id,
            rating: s.rating,
        }
    }
}

#[derive(Deserialize, Validate)]
struct SubscribeRequest {
    athlete: i64,
}

async fn subscribe_to_coach(
    State(state): State<Arc<AppState>>,
    Path(coach_id): Path<i64>,
    ValidJson(body): ValidJson<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    match state.db.get_user(coach_id)? {
        Some(coach) if coach.is_coach() => {}
        Some(_) => return Err(AppError::BadRequest(format!("User {} is not a coach", coach_id))),
        None => return Err(AppError::BadRequest(format!("Coach {} does not exist", coach_id))),
    }
    match state.db.get_user(body.athlete)? {
        Some(athlete) if !athlete.is_coach() => {}
        Some(_) => {
            return Err(AppError::BadRequest(format!(
                "User {} is not an athlete",
                body.athlete
            )))
        }
        None => {
            return Err(AppError::BadRequest(format!(
                "Athlete {} does not exist",
                body.athlete
            )))
        }
    }

    let subscription = state.db.create_subscription(coach_id, body.athlete)?;
    tracing::info!(coach_id, athlete_id = body.athlete, "Athlete subscribed to coach");

    Ok((StatusCode::CREATED, Json(subscription.into())))
}

#[derive(Deserialize, Validate)]
struct RateCoachRequest {
    athlete: i64,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    rating: i64,
}

async fn rate_coach(
    State(state): State<Arc<AppState>>,
    Path(coach_id): Path<i64>,
    ValidJson(body): ValidJson<RateCoachRequest>,
) -> Result<Json<SubscribeResponse>> {
    let mut subscription = state
        .db
        .get_subscription(coach_id, body.athlete)?
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Athlete {} is not subscribed to coach {}",
                body.athlete, coach_id
            ))
        })?;

    state.db.rate_subscription(subscription.id, body.rating)?;
    subscription.rating = Some(body.rating);
    tracing::info!(coach_id, athlete_id = body.athlete, rating = body.rating, "Coach rated");

    Ok(Json(subscription.into()))
}
