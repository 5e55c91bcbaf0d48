// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run lifecycle over HTTP: start, stop, and distance computation.

use axum::http::StatusCode;
use run_tracker::models::RunStatus;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_create_run_starts_in_init() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/runs",
        Some(json!({"athlete": athlete.id, "comment": "Morning loop"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "init");
    assert_eq!(body["comment"], "Morning loop");
    assert_eq!(body["distance"], 0.0);
    assert_eq!(body["athlete_data"]["username"], "anna");
}

#[tokio::test]
async fn test_create_run_for_unknown_athlete() {
    let (app, _state) = common::create_test_app();

    let (status, _) =
        common::send(&app, "POST", "/api/runs", Some(json!({"athlete": 404}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_start_twice_fails() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run = state.db.create_run(athlete.id, "").unwrap();
    let uri = format!("/api/runs/{}/start", run.id);

    let (status, body) = common::send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");

    let (status, body) = common::send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid run status for starting."}));
}

#[tokio::test]
async fn test_stop_init_run_fails() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run = state.db.create_run(athlete.id, "").unwrap();

    let (status, body) =
        common::send(&app, "POST", &format!("/api/runs/{}/stop", run.id), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid run status for stopping."}));
    assert_eq!(
        state.db.get_run(run.id).unwrap().unwrap().status,
        RunStatus::Init
    );
}

#[tokio::test]
async fn test_stop_missing_run_is_not_found() {
    let (app, _state) = common::create_test_app();

    let (status, _) = common::send(&app, "POST", "/api/runs/999/stop", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stop_computes_distance() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    for (lat, lon) in [(0.001, 0.001), (0.010, 0.011)] {
        let (status, _) = common::send(
            &app,
            "POST",
            "/api/positions",
            Some(json!({"run": run_id, "latitude": lat, "longitude": lon})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) =
        common::send(&app, "POST", &format!("/api/runs/{}/stop", run_id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "finished");
    let distance = body["distance"].as_f64().unwrap();
    assert!((distance - 1.493).abs() <= 0.001, "got {}", distance);
}

#[tokio::test]
async fn test_stop_with_too_few_positions_still_finishes() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    let (status, body) =
        common::send(&app, "POST", &format!("/api/runs/{}/stop", run_id), None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({"error": "Run stopped. Not enough positions to calculate distance."})
    );

    let run = state.db.get_run(run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.distance, 0.0);
}

#[tokio::test]
async fn test_list_runs_filters_by_status_and_athlete() {
    let (app, state) = common::create_test_app();
    let anna = common::create_user(&state, "anna", false);
    let boris = common::create_user(&state, "boris", false);
    state.db.create_run(anna.id, "idle").unwrap();
    common::start_new_run(&state, anna.id).await;
    common::start_new_run(&state, boris.id).await;

    let (status, body) = common::send(&app, "GET", "/api/runs?status=in_progress", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let uri = format!("/api/runs?status=in_progress&athlete={}", anna.id);
    let (_, body) = common::send(&app, "GET", &uri, None).await;
    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["athlete"], anna.id);

    let (status, _) = common::send(&app, "GET", "/api/runs?status=paused", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_runs_paginates_with_size() {
    let (app, state) = common::create_test_app();
    let anna = common::create_user(&state, "anna", false);
    for _ in 0..3 {
        state.db.create_run(anna.id, "").unwrap();
    }

    let (status, body) = common::send(&app, "GET", "/api/runs?size=2&page=2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_run_removes_positions() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;
    common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": 1.0, "longitude": 1.0})),
    )
    .await;

    let (status, body) =
        common::send(&app, "DELETE", &format!("/api/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);

    let (status, _) = common::send(&app, "GET", &format!("/api/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) =
        common::send(&app, "GET", &format!("/api/positions?run={}", run_id), None).await;
    assert!(body.as_array().unwrap().is_empty());
}
