// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position ingestion: validation, derived metrics, and item pickup.

use axum::http::StatusCode;
use run_tracker::models::{Coordinate, NewCollectibleItem};
use serde_json::json;

mod common;

#[tokio::test]
async fn test_out_of_range_coordinates_rejected() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    for (lat, lon) in [(90.5, 0.0), (-91.0, 0.0), (0.0, 180.01), (0.0, -200.0)] {
        let (status, body) = common::send(
            &app,
            "POST",
            "/api/positions",
            Some(json!({"run": run_id, "latitude": lat, "longitude": lon})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "({}, {})", lat, lon);
        assert!(body["detail"].is_string());
    }

    assert!(state.db.positions_for_run(run_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_boundary_coordinates_accepted() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": -90.0, "longitude": 180.0})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["latitude"], -90.0);
    assert_eq!(body["longitude"], 180.0);
}

#[tokio::test]
async fn test_position_requires_run_in_progress() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run = state.db.create_run(athlete.id, "").unwrap();

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run.id, "latitude": 1.0, "longitude": 1.0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"detail": "Run must be in progress to record a position."})
    );
    assert!(state.db.positions_for_run(run.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_position_for_finished_run_rejected() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::complete_run(
        &state,
        athlete.id,
        &[(0.0, 0.0, None), (0.0, 0.001, None)],
    )
    .await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": 1.0, "longitude": 1.0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.db.positions_for_run(run_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_position_for_unknown_run_rejected() {
    let (app, _state) = common::create_test_app();

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": 4242, "latitude": 1.0, "longitude": 1.0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Run 4242 does not exist");
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": "north"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": 1.0, "longitude": 1.0, "date_time": "yesterday"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_position_metrics_and_rounding() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let run_id = common::start_new_run(&state, athlete.id).await;

    let (status, first) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({
            "run": run_id,
            "latitude": 0.00104,
            "longitude": 0.00096,
            "date_time": "2024-05-01T08:00:00.000000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["latitude"], 0.001);
    assert_eq!(first["longitude"], 0.001);
    assert_eq!(first["distance"], 0.0);
    assert_eq!(first["speed"], 0.0);
    assert_eq!(first["date_time"], "2024-05-01T08:00:00.000000");

    let (_, second) = common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({
            "run": run_id,
            "latitude": 0.010,
            "longitude": 0.011,
            "date_time": "2024-05-01T08:05:00Z"
        })),
    )
    .await;
    assert_eq!(second["distance"], 1.49);
    assert_eq!(second["speed"], 4.98);

    let (_, run) = common::send(&app, "GET", &format!("/api/runs/{}", run_id), None).await;
    assert_eq!(run["run_time_seconds"], 300);
    assert_eq!(run["speed"], 2.49);

    let (_, listed) =
        common::send(&app, "GET", &format!("/api/positions?run={}", run_id), None).await;
    let ids: Vec<i64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![first["id"].as_i64().unwrap(), second["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn test_item_collected_exactly_once() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    let item = state
        .db
        .create_item(&NewCollectibleItem {
            name: "Golden shoe".to_string(),
            uid: "shoe-1".to_string(),
            value: 10,
            coordinate: Coordinate::new(55.7512, 37.6184),
            picture: String::new(),
        })
        .unwrap();
    let run_id = common::start_new_run(&state, athlete.id).await;

    // Both fixes are within ~30 m of the item
    for (lat, lon) in [(55.7513, 37.6184), (55.7514, 37.6185)] {
        let (status, _) = common::send(
            &app,
            "POST",
            "/api/positions",
            Some(json!({"run": run_id, "latitude": lat, "longitude": lon})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, detail) =
        common::send(&app, "GET", &format!("/api/users/{}", athlete.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = detail["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], item.id);
}

#[tokio::test]
async fn test_item_out_of_range_not_collected() {
    let (app, state) = common::create_test_app();
    let athlete = common::create_user(&state, "anna", false);
    state
        .db
        .create_item(&NewCollectibleItem {
            name: "Far flag".to_string(),
            uid: "flag-1".to_string(),
            value: 1,
            coordinate: Coordinate::new(10.0, 10.0),
            picture: String::new(),
        })
        .unwrap();
    let run_id = common::start_new_run(&state, athlete.id).await;

    // ~222 m north of the item
    common::send(
        &app,
        "POST",
        "/api/positions",
        Some(json!({"run": run_id, "latitude": 10.002, "longitude": 10.0})),
    )
    .await;

    assert!(state.db.items_collected_by(athlete.id).unwrap().is_empty());
}
