// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User identity and athlete profile models.

use chrono::{DateTime, Utc};

/// A registered identity. Staff users are coaches; everyone else is an athlete.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_coach(&self) -> bool {
        self.is_staff
    }

    /// Role label used by the API (`coach` or `athlete`).
    pub fn kind(&self) -> &'static str {
        if self.is_staff {
            "coach"
        } else {
            "athlete"
        }
    }

    /// "First Last", falling back to the username when both are empty.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_string()
        }
    }
}

/// Fields for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Athlete profile (one-to-one with a user), created lazily on first need.
#[derive(Debug, Clone, PartialEq)]
pub struct AthleteInfo {
    pub id: i64,
    pub user_id: i64,
    pub goals: String,
    /// Body weight, strictly between 0 and 900 when set
    pub weight: Option<i64>,
}
