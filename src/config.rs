// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// SQLite database file (`:memory:` for an ephemeral store)
    pub database_path: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,

    // --- Company details (served verbatim) ---
    pub company_name: String,
    pub slogan: String,
    pub contacts: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => 8080,
        };

        Ok(Self {
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "run_tracker.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            company_name: env::var("COMPANY_NAME")
                .map_err(|_| ConfigError::Missing("COMPANY_NAME"))?,
            slogan: env::var("SLOGAN").unwrap_or_default(),
            contacts: env::var("CONTACTS").unwrap_or_default(),
        })
    }

    /// Config for tests: in-memory database, fixed company details.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            database_path: ":memory:".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            company_name: "Run Tracker".to_string(),
            slogan: "Keep moving".to_string(),
            contacts: "team@example.com".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
