// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use run_tracker::config::Config;
use run_tracker::db::Database;
use run_tracker::models::{Coordinate, NewUser, User};
use run_tracker::routes::create_router;
use run_tracker::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Create a test app backed by a fresh in-memory database.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = Database::open(&config.database_path).expect("Failed to open in-memory database");
    let state = Arc::new(AppState::new(config, db));

    (create_router(state.clone()), state)
}

/// Send a request and decode the JSON response body (`Value::Null` if empty).
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Insert a user directly into the store.
#[allow(dead_code)]
pub fn create_user(state: &AppState, username: &str, is_staff: bool) -> User {
    state
        .db
        .create_user(&NewUser {
            username: username.to_string(),
            first_name: format!("{}-first", username),
            last_name: format!("{}-last", username),
            is_staff,
            is_superuser: false,
        })
        .unwrap()
}

/// Create a run, start it, and return its id.
#[allow(dead_code)]
pub async fn start_new_run(state: &AppState, athlete_id: i64) -> i64 {
    let run = state.db.create_run(athlete_id, "").unwrap();
    state.runs.start(run.id).await.unwrap();
    run.id
}

/// Run a full start/ingest/stop cycle over `path` (timestamps optional).
#[allow(dead_code)]
pub async fn complete_run(
    state: &AppState,
    athlete_id: i64,
    path: &[(f64, f64, Option<chrono::DateTime<chrono::Utc>>)],
) -> i64 {
    let run_id = start_new_run(state, athlete_id).await;
    for &(lat, lon, at) in path {
        state
            .runs
            .ingest_position(run_id, Coordinate::new(lat, lon), at)
            .await
            .unwrap();
    }
    state.runs.stop(run_id).await.unwrap();
    run_id
}
