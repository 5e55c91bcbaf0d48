// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Run Tracker: record runs from GPS fixes and reward athletes for them
//!
//! This crate provides the backend API for tracking runs, computing their
//! geodesic distance, unlocking challenges, and crediting collectible items
//! picked up along the way.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::RunService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub runs: RunService,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Self {
        let runs = RunService::new(db.clone());
        Self { config, db, runs }
    }
}
