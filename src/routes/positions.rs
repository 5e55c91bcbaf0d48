// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position routes.

use crate::error::Result;
use crate::models::{Coordinate, Position};
use crate::routes::extract::ValidJson;
use crate::time_utils::{deserialize_optional_client_time, format_position_time};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/positions", get(list_positions).post(create_position))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PositionResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub run: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub date_time: Option<String>,
    /// Cumulative kilometers
    pub distance: f64,
    /// Segment speed (m/s)
    pub speed: f64,
}

impl From<Position> for PositionResponse {
    fn from(p: Position) -> Self {
        Self {
            id: p.id,
            run: p.run_id,
            latitude: p.coordinate.latitude,
            longitude: p.coordinate.longitude,
            date_time: p.date_time.map(format_position_time),
            distance: p.distance,
            speed: p.speed,
        }
    }
}

#[derive(Deserialize)]
struct PositionsQuery {
    run: Option<i64>,
}

async fn list_positions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PositionsQuery>,
) -> Result<Json<Vec<PositionResponse>>> {
    let positions = state.db.list_positions(params.run)?;
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize, Validate)]
struct CreatePositionRequest {
    run: i64,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90."))]
    latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180."
    ))]
    longitude: f64,
    #[serde(default, deserialize_with = "deserialize_optional_client_time")]
    date_time: Option<DateTime<Utc>>,
}

/// Record a GPS fix. Distance, speed and item pickup are derived server-side.
async fn create_position(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreatePositionRequest>,
) -> Result<(StatusCode, Json<PositionResponse>)> {
    let position = state
        .runs
        .ingest_position(
            body.run,
            Coordinate::new(body.latitude, body.longitude),
            body.date_time,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(position.into())))
}
