// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collectible item routes.

use crate::error::{AppError, Result};
use crate::models::{CollectibleItem, Coordinate, NewCollectibleItem};
use crate::routes::extract::ValidJson;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/collectible_item", get(list_items).post(create_item))
        .route("/api/collectible_item/{id}", get(get_item))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ItemResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub name: String,
    pub uid: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub value: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub picture: String,
}

impl From<CollectibleItem> for ItemResponse {
    fn from(item: CollectibleItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            uid: item.uid,
            value: item.value,
            latitude: item.coordinate.latitude,
            longitude: item.coordinate.longitude,
            picture: item.picture,
        }
    }
}

async fn list_items(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ItemResponse>>> {
    let items = state.db.list_items()?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
) -> Result<Json<ItemResponse>> {
    let item = state
        .db
        .get_item(item_id)?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
    Ok(Json(item.into()))
}

#[derive(Deserialize, Validate)]
struct CreateItemRequest {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[validate(length(min = 1, max = 255))]
    uid: String,
    value: i64,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90."))]
    latitude: f64,
    #[validate(range(
        min = -180.0,
        max = 180.0,
        message = "Longitude must be between -180 and 180."
    ))]
    longitude: f64,
    #[serde(default)]
    #[validate(url)]
    picture: Option<String>,
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>)> {
    let item = state.db.create_item(&NewCollectibleItem {
        name: body.name,
        uid: body.uid,
        value: body.value,
        coordinate: Coordinate::new(body.latitude, body.longitude),
        picture: body.picture.unwrap_or_default(),
    })?;
    tracing::info!(item_id = item.id, name = %item.name, "Collectible item created");

    Ok((StatusCode::CREATED, Json(item.into())))
}
