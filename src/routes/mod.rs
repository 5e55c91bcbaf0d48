// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod athletes;
pub mod challenges;
pub mod extract;
pub mod items;
pub mod positions;
pub mod runs;

use crate::error::{AppError, Result};
use crate::AppState;
use axum::extract::State;
use axum::http::{header, Method};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CompanyDetailsResponse {
    pub company_name: String,
    pub slogan: String,
    pub contacts: String,
}

async fn company_details(State(state): State<Arc<AppState>>) -> Json<CompanyDetailsResponse> {
    Json(CompanyDetailsResponse {
        company_name: state.config.company_name.clone(),
        slogan: state.config.slogan.clone(),
        contacts: state.config.contacts.clone(),
    })
}

// ─── Pagination ──────────────────────────────────────────────

const MAX_PAGE_SIZE: usize = 100;

/// A list response: the full list, or one page of it when `size` is given.
#[derive(Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    All(Vec<T>),
    Page { count: usize, results: Vec<T> },
}

/// Slice `items` into the requested page (1-indexed).
pub(crate) fn paginate<T>(items: Vec<T>, page: Option<usize>, size: Option<usize>) -> Result<Listing<T>> {
    let Some(size) = size else {
        return Ok(Listing::All(items));
    };
    let page = page.unwrap_or(1);
    if page < 1 || size < 1 {
        return Err(AppError::BadRequest(
            "Page and size must be greater than 0".to_string(),
        ));
    }
    let size = size.min(MAX_PAGE_SIZE);

    let count = items.len();
    let start = (page - 1)
        .checked_mul(size)
        .ok_or_else(|| AppError::BadRequest("Page number causes overflow".to_string()))?;

    let results = items.into_iter().skip(start).take(size).collect();
    Ok(Listing::Page { count, results })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == frontend_url
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/company_details", get(company_details))
        .merge(runs::routes())
        .merge(positions::routes())
        .merge(athletes::routes())
        .merge(challenges::routes())
        .merge(items::routes())
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
