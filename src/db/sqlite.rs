// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite row store with typed operations.
//!
//! Provides high-level operations for:
//! - Users and athlete profiles
//! - Runs and their lifecycle transitions
//! - Positions (GPS fixes) and run aggregates
//! - Challenges (unlocked achievements)
//! - Collectible items and who collected them
//! - Coach subscriptions
//!
//! State transitions are compare-and-set updates inside a transaction, and
//! idempotent records rely on unique constraints, so concurrent callers can
//! never apply the same transition or unlock twice.

use crate::db::tables;
use anyhow::anyhow;
use crate::error::AppError;
use crate::models::{
    AthleteInfo, AthleteStats, Challenge, CollectibleItem, Coordinate, NewCollectibleItem,
    NewPosition, NewUser, Position, Run, RunAction, RunStatus, Subscribe, TransitionError, User,
};
use crate::services::distance::{round_to, SegmentMetrics};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        is_staff INTEGER NOT NULL DEFAULT 0,
        is_superuser INTEGER NOT NULL DEFAULT 0,
        date_joined TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        athlete_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        comment TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'init'
            CHECK (status IN ('init', 'in_progress', 'finished')),
        distance REAL NOT NULL DEFAULT 0,
        run_time_seconds INTEGER,
        speed REAL
    );
    CREATE INDEX IF NOT EXISTS idx_runs_athlete_status ON runs(athlete_id, status);

    CREATE TABLE IF NOT EXISTS positions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
        latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
        longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
        date_time TEXT,
        distance REAL NOT NULL DEFAULT 0,
        speed REAL NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_positions_run ON positions(run_id, id);

    CREATE TABLE IF NOT EXISTS athlete_info (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        goals TEXT NOT NULL DEFAULT '',
        weight INTEGER CHECK (weight IS NULL OR (weight > 0 AND weight < 900))
    );

    CREATE TABLE IF NOT EXISTS challenges (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        athlete_info_id INTEGER NOT NULL REFERENCES athlete_info(id) ON DELETE CASCADE,
        full_name TEXT NOT NULL,
        UNIQUE (athlete_info_id, full_name)
    );

    CREATE TABLE IF NOT EXISTS collectible_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        uid TEXT NOT NULL,
        value INTEGER NOT NULL,
        latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
        longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
        picture TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS item_collections (
        item_id INTEGER NOT NULL REFERENCES collectible_items(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (item_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS subscriptions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coach_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        athlete_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 1 AND 5),
        UNIQUE (coach_id, athlete_id)
    );
"#;

const USER_COLUMNS: &str =
    "id, username, first_name, last_name, is_staff, is_superuser, date_joined";
const RUN_COLUMNS: &str =
    "id, athlete_id, comment, created_at, status, distance, run_time_seconds, speed";
const POSITION_COLUMNS: &str = "id, run_id, latitude, longitude, date_time, distance, speed";
const ITEM_COLUMNS: &str = "id, name, uid, value, latitude, longitude, picture";

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Filters for listing runs.
#[derive(Debug, Clone, Default)]
pub struct RunQuery {
    pub status: Option<RunStatus>,
    pub athlete_id: Option<i64>,
    /// Order by creation time; `None` orders by id.
    pub created_at: Option<SortOrder>,
}

/// Filters for listing users. Superusers are never listed.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// `Some(true)` for coaches only, `Some(false)` for athletes only
    pub is_staff: Option<bool>,
    /// Order by join date; `None` orders by id.
    pub date_joined: Option<SortOrder>,
}

/// A user with derived counters.
#[derive(Debug, Clone)]
pub struct UserWithStats {
    pub user: User,
    pub runs_finished: i64,
    /// Average rating received as a coach
    pub rating: Option<f64>,
}

/// Result of finishing a run.
#[derive(Debug, Clone)]
pub struct FinishedRun {
    pub run: Run,
    /// Challenges newly unlocked by this completion
    pub unlocked: Vec<String>,
}

/// SQLite database client.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::Database(format!("Failed to open {}: {}", path, e)))?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(path, "Opened SQLite database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn in_memory() -> Result<Self, AppError> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Database("Connection lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), AppError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create a user.
    pub fn create_user(&self, new: &NewUser) -> Result<User, AppError> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (username, first_name, last_name, is_staff, is_superuser, date_joined)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    tables::USERS
                ),
                params![
                    new.username,
                    new.first_name,
                    new.last_name,
                    new.is_staff,
                    new.is_superuser,
                    Utc::now()
                ],
            )?;
        if inserted == 0 {
            return Err(AppError::BadRequest(format!(
                "Username {} is already taken",
                new.username
            )));
        }

        let id = conn.last_insert_rowid();
        query_user(&conn, id)?
            .ok_or_else(|| AppError::Internal(anyhow!("User {} vanished after insert", id)))
    }

    /// Get a user by id.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let conn = self.lock()?;
        Ok(query_user(&conn, user_id)?)
    }

    /// Get a user with finished-run count and coach rating.
    pub fn get_user_with_stats(&self, user_id: i64) -> Result<Option<UserWithStats>, AppError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE u.id = ?1", user_stats_select());
        Ok(conn
            .query_row(&sql, params![user_id], user_with_stats_from_row)
            .optional()?)
    }

    /// List non-superusers with derived counters.
    pub fn list_users(&self, query: &UserQuery) -> Result<Vec<UserWithStats>, AppError> {
        let mut sql = format!("{} WHERE u.is_superuser = 0", user_stats_select());
        let mut args: Vec<Value> = Vec::new();

        if let Some(is_staff) = query.is_staff {
            args.push(Value::Integer(is_staff as i64));
            sql.push_str(&format!(" AND u.is_staff = ?{}", args.len()));
        }

        match query.date_joined {
            Some(order) => sql.push_str(&format!(" ORDER BY u.date_joined {0}, u.id {0}", order.sql())),
            None => sql.push_str(" ORDER BY u.id"),
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(args), user_with_stats_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    // ─── Athlete Profile Operations ──────────────────────────────

    /// Fetch the athlete profile for a user, creating an empty one if absent.
    ///
    /// Idempotent: repeated calls return the same profile.
    pub fn get_or_create_athlete_info(&self, user_id: i64) -> Result<AthleteInfo, AppError> {
        let conn = self.lock()?;
        Ok(athlete_info_or_create(&conn, user_id)?)
    }

    /// Update the profile for a user, creating it first if absent.
    ///
    /// Fields left as `None` keep their stored values.
    pub fn upsert_athlete_info(
        &self,
        user_id: i64,
        goals: Option<&str>,
        weight: Option<i64>,
    ) -> Result<AthleteInfo, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let info = athlete_info_or_create(&tx, user_id)?;
        tx.execute(
            &format!(
                "UPDATE {} SET goals = ?1, weight = ?2 WHERE id = ?3",
                tables::ATHLETE_INFO
            ),
            params![
                goals.unwrap_or(&info.goals),
                weight.or(info.weight),
                info.id
            ],
        )?;
        let updated = athlete_info_or_create(&tx, user_id)?;

        tx.commit()?;
        Ok(updated)
    }

    // ─── Run Operations ──────────────────────────────────────────

    /// Create a run in `init` status.
    pub fn create_run(&self, athlete_id: i64, comment: &str) -> Result<Run, AppError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (athlete_id, comment, created_at, status) VALUES (?1, ?2, ?3, ?4)",
                tables::RUNS
            ),
            params![athlete_id, comment, Utc::now(), RunStatus::Init],
        )?;

        let id = conn.last_insert_rowid();
        query_run(&conn, id)?
            .ok_or_else(|| AppError::Internal(anyhow!("Run {} vanished after insert", id)))
    }

    /// Get a run by id.
    pub fn get_run(&self, run_id: i64) -> Result<Option<Run>, AppError> {
        let conn = self.lock()?;
        Ok(query_run(&conn, run_id)?)
    }

    /// List runs matching the query.
    pub fn list_runs(&self, query: &RunQuery) -> Result<Vec<Run>, AppError> {
        let mut clauses = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            args.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(athlete_id) = query.athlete_id {
            args.push(Value::Integer(athlete_id));
            clauses.push(format!("athlete_id = ?{}", args.len()));
        }

        let mut sql = format!("SELECT {} FROM {}", RUN_COLUMNS, tables::RUNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        match query.created_at {
            Some(order) => sql.push_str(&format!(" ORDER BY created_at {0}, id {0}", order.sql())),
            None => sql.push_str(" ORDER BY id"),
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params_from_iter(args), run_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    /// Delete a run and its positions. Returns `false` if it did not exist.
    pub fn delete_run(&self, run_id: i64) -> Result<bool, AppError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", tables::RUNS),
            params![run_id],
        )?;
        Ok(deleted > 0)
    }

    /// Move a run from `init` to `in_progress`.
    pub fn start_run(&self, run_id: i64) -> Result<Run, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = query_run(&tx, run_id)?.ok_or_else(|| run_not_found(run_id))?;
        let next = current.status.transition(RunAction::Start)?;
        compare_and_set_status(&tx, run_id, current.status, next, TransitionError::CannotStart)?;

        let run = query_run(&tx, run_id)?.ok_or_else(|| run_not_found(run_id))?;
        tx.commit()?;
        Ok(run)
    }

    /// Atomically finish a run and unlock achievements.
    ///
    /// Within one transaction this:
    /// 1. Moves the run from `in_progress` to `finished` (compare-and-set)
    /// 2. Stores the computed distance
    /// 3. Ensures the athlete profile exists
    /// 4. Derives stats from the athlete's full run history
    /// 5. Inserts a challenge for every name `evaluate` returns, skipping ones
    ///    already unlocked
    pub fn finish_run<F>(
        &self,
        run_id: i64,
        distance_km: f64,
        evaluate: F,
    ) -> Result<FinishedRun, AppError>
    where
        F: FnOnce(&AthleteStats) -> Vec<&'static str>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = query_run(&tx, run_id)?.ok_or_else(|| run_not_found(run_id))?;
        let next = current.status.transition(RunAction::Stop)?;
        compare_and_set_status(&tx, run_id, current.status, next, TransitionError::CannotStop)?;
        tx.execute(
            &format!("UPDATE {} SET distance = ?1 WHERE id = ?2", tables::RUNS),
            params![distance_km, run_id],
        )?;

        let run = query_run(&tx, run_id)?.ok_or_else(|| run_not_found(run_id))?;
        let info = athlete_info_or_create(&tx, run.athlete_id)?;

        let history = query_runs_for_athlete(&tx, run.athlete_id)?;
        let stats = AthleteStats::from_history(&history, &run);

        let mut unlocked = Vec::new();
        for name in evaluate(&stats) {
            let inserted = tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (athlete_info_id, full_name) VALUES (?1, ?2)",
                    tables::CHALLENGES
                ),
                params![info.id, name],
            )?;
            if inserted > 0 {
                unlocked.push(name.to_string());
            }
        }

        tx.commit()?;

        tracing::debug!(
            run_id,
            athlete_id = run.athlete_id,
            finished_runs = stats.finished_runs,
            total_distance_km = stats.total_distance_km,
            "Run history evaluated"
        );

        Ok(FinishedRun { run, unlocked })
    }

    // ─── Position Operations ─────────────────────────────────────

    /// All positions of a run in insertion order.
    pub fn positions_for_run(&self, run_id: i64) -> Result<Vec<Position>, AppError> {
        let conn = self.lock()?;
        Ok(query_positions(&conn, Some(run_id))?)
    }

    /// All positions, optionally restricted to one run.
    pub fn list_positions(&self, run_id: Option<i64>) -> Result<Vec<Position>, AppError> {
        let conn = self.lock()?;
        Ok(query_positions(&conn, run_id)?)
    }

    /// Most recently inserted position of a run.
    pub fn last_position(&self, run_id: i64) -> Result<Option<Position>, AppError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
            POSITION_COLUMNS,
            tables::POSITIONS
        );
        Ok(conn
            .query_row(&sql, params![run_id], position_from_row)
            .optional()?)
    }

    /// Append a position and refresh the run's speed and elapsed time.
    ///
    /// The insert only happens while the run is `in_progress`; otherwise the
    /// store is left untouched.
    pub fn insert_position(
        &self,
        new: &NewPosition,
        metrics: SegmentMetrics,
    ) -> Result<Position, AppError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            &format!(
                "INSERT INTO {} (run_id, latitude, longitude, date_time, distance, speed)
                 SELECT id, ?2, ?3, ?4, ?5, ?6 FROM {} WHERE id = ?1 AND status = ?7",
                tables::POSITIONS,
                tables::RUNS
            ),
            params![
                new.run_id,
                new.coordinate.latitude,
                new.coordinate.longitude,
                new.date_time,
                metrics.distance_km,
                metrics.speed,
                RunStatus::InProgress
            ],
        )?;
        if inserted == 0 {
            return Err(match query_run(&tx, new.run_id)? {
                None => AppError::BadRequest(format!("Run {} does not exist", new.run_id)),
                Some(_) => TransitionError::NotRecording.into(),
            });
        }
        let position_id = tx.last_insert_rowid();

        let positions = query_positions(&tx, Some(new.run_id))?;
        let mean_speed =
            positions.iter().map(|p| p.speed).sum::<f64>() / positions.len() as f64;
        let timestamps = positions.iter().filter_map(|p| p.date_time);
        let run_time_seconds = match (timestamps.clone().min(), timestamps.max()) {
            (Some(first), Some(last)) => Some((last - first).num_seconds()),
            _ => None,
        };

        tx.execute(
            &format!(
                "UPDATE {} SET speed = ?1, run_time_seconds = COALESCE(?2, run_time_seconds) WHERE id = ?3",
                tables::RUNS
            ),
            params![round_to(mean_speed, 2), run_time_seconds, new.run_id],
        )?;

        tx.commit()?;

        positions
            .into_iter()
            .find(|p| p.id == position_id)
            .ok_or_else(|| AppError::Internal(anyhow!("Position {} vanished", position_id)))
    }

    // ─── Challenge Operations ────────────────────────────────────

    /// List challenges, optionally for one athlete (by user id).
    pub fn list_challenges(&self, user_id: Option<i64>) -> Result<Vec<Challenge>, AppError> {
        let mut sql = format!(
            "SELECT c.id, c.athlete_info_id, a.user_id, c.full_name
             FROM {} c JOIN {} a ON a.id = c.athlete_info_id",
            tables::CHALLENGES,
            tables::ATHLETE_INFO
        );
        let mut args: Vec<Value> = Vec::new();
        if let Some(user_id) = user_id {
            args.push(Value::Integer(user_id));
            sql.push_str(" WHERE a.user_id = ?1");
        }
        sql.push_str(" ORDER BY c.id");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let challenges = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(Challenge {
                    id: row.get(0)?,
                    athlete_info_id: row.get(1)?,
                    user_id: row.get(2)?,
                    full_name: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(challenges)
    }

    /// Every (challenge name, holder) pair, ordered by name then user id.
    pub fn challenge_holders(&self) -> Result<Vec<(String, User)>, AppError> {
        let sql = format!(
            "SELECT c.full_name, u.id, u.username, u.first_name, u.last_name, u.is_staff, u.is_superuser, u.date_joined
             FROM {} c
             JOIN {} a ON a.id = c.athlete_info_id
             JOIN {} u ON u.id = a.user_id
             ORDER BY c.full_name, u.id",
            tables::CHALLENGES,
            tables::ATHLETE_INFO,
            tables::USERS
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let holders = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    User {
                        id: row.get(1)?,
                        username: row.get(2)?,
                        first_name: row.get(3)?,
                        last_name: row.get(4)?,
                        is_staff: row.get(5)?,
                        is_superuser: row.get(6)?,
                        date_joined: row.get(7)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(holders)
    }

    // ─── Collectible Item Operations ─────────────────────────────

    /// Create a collectible item.
    pub fn create_item(&self, new: &NewCollectibleItem) -> Result<CollectibleItem, AppError> {
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, uid, value, latitude, longitude, picture)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                tables::COLLECTIBLE_ITEMS
            ),
            params![
                new.name,
                new.uid,
                new.value,
                new.coordinate.latitude,
                new.coordinate.longitude,
                new.picture
            ],
        )?;

        let id = conn.last_insert_rowid();
        query_item(&conn, id)?
            .ok_or_else(|| AppError::Internal(anyhow!("Item {} vanished after insert", id)))
    }

    /// Get an item by id.
    pub fn get_item(&self, item_id: i64) -> Result<Option<CollectibleItem>, AppError> {
        let conn = self.lock()?;
        Ok(query_item(&conn, item_id)?)
    }

    /// List all items.
    pub fn list_items(&self) -> Result<Vec<CollectibleItem>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id",
            ITEM_COLUMNS,
            tables::COLLECTIBLE_ITEMS
        ))?;
        let items = stmt
            .query_map([], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Mark an item as collected by a user.
    ///
    /// Returns `true` only on the first collection; repeats are no-ops.
    pub fn collect_item(&self, item_id: i64, user_id: i64) -> Result<bool, AppError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (item_id, user_id) VALUES (?1, ?2)",
                tables::ITEM_COLLECTIONS
            ),
            params![item_id, user_id],
        )?;
        Ok(inserted > 0)
    }

    /// Items a user has collected.
    pub fn items_collected_by(&self, user_id: i64) -> Result<Vec<CollectibleItem>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT i.id, i.name, i.uid, i.value, i.latitude, i.longitude, i.picture
             FROM {} i JOIN {} c ON c.item_id = i.id
             WHERE c.user_id = ?1 ORDER BY i.id",
            tables::COLLECTIBLE_ITEMS,
            tables::ITEM_COLLECTIONS
        ))?;
        let items = stmt
            .query_map(params![user_id], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    // ─── Subscription Operations ─────────────────────────────────

    /// Subscribe an athlete to a coach. Fails if the pair already exists.
    pub fn create_subscription(&self, coach_id: i64, athlete_id: i64) -> Result<Subscribe, AppError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (coach_id, athlete_id) VALUES (?1, ?2)",
                tables::SUBSCRIPTIONS
            ),
            params![coach_id, athlete_id],
        )?;
        if inserted == 0 {
            return Err(AppError::BadRequest("Subscription already exists".to_string()));
        }

        query_subscription(&conn, coach_id, athlete_id)?
            .ok_or_else(|| AppError::Internal(anyhow!("Subscription vanished after insert")))
    }

    /// Get the subscription for a (coach, athlete) pair.
    pub fn get_subscription(
        &self,
        coach_id: i64,
        athlete_id: i64,
    ) -> Result<Option<Subscribe>, AppError> {
        let conn = self.lock()?;
        Ok(query_subscription(&conn, coach_id, athlete_id)?)
    }

    /// Set the rating on an existing subscription.
    pub fn rate_subscription(&self, subscription_id: i64, rating: i64) -> Result<(), AppError> {
        let conn = self.lock()?;
        conn.execute(
            &format!("UPDATE {} SET rating = ?1 WHERE id = ?2", tables::SUBSCRIPTIONS),
            params![rating, subscription_id],
        )?;
        Ok(())
    }

    /// Athletes subscribed to a coach.
    pub fn athletes_of_coach(&self, coach_id: i64) -> Result<Vec<i64>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT athlete_id FROM {} WHERE coach_id = ?1 ORDER BY athlete_id",
            tables::SUBSCRIPTIONS
        ))?;
        let ids = stmt
            .query_map(params![coach_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// The coach an athlete subscribed to first, if any.
    pub fn coach_of_athlete(&self, athlete_id: i64) -> Result<Option<i64>, AppError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT coach_id FROM {} WHERE athlete_id = ?1 ORDER BY id LIMIT 1",
                    tables::SUBSCRIPTIONS
                ),
                params![athlete_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────
//
// These take a plain `&Connection` so they work both directly and inside a
// `Transaction` (which derefs to `Connection`).

fn run_not_found(run_id: i64) -> AppError {
    AppError::NotFound(format!("Run {} not found", run_id))
}

/// Conditionally move a run between statuses; zero affected rows means a
/// concurrent caller already moved it.
fn compare_and_set_status(
    conn: &Connection,
    run_id: i64,
    expected: RunStatus,
    next: RunStatus,
    on_conflict: TransitionError,
) -> Result<(), AppError> {
    let updated = conn.execute(
        &format!(
            "UPDATE {} SET status = ?1 WHERE id = ?2 AND status = ?3",
            tables::RUNS
        ),
        params![next, run_id, expected],
    )?;
    if updated == 0 {
        return Err(on_conflict.into());
    }
    Ok(())
}

fn user_stats_select() -> String {
    format!(
        "SELECT u.id, u.username, u.first_name, u.last_name, u.is_staff, u.is_superuser, u.date_joined,
                (SELECT COUNT(*) FROM {runs} r WHERE r.athlete_id = u.id AND r.status = 'finished'),
                (SELECT AVG(s.rating) FROM {subs} s WHERE s.coach_id = u.id)
         FROM {users} u",
        runs = tables::RUNS,
        subs = tables::SUBSCRIPTIONS,
        users = tables::USERS
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        is_staff: row.get(4)?,
        is_superuser: row.get(5)?,
        date_joined: row.get(6)?,
    })
}

fn user_with_stats_from_row(row: &Row<'_>) -> rusqlite::Result<UserWithStats> {
    Ok(UserWithStats {
        user: user_from_row(row)?,
        runs_finished: row.get(7)?,
        rating: row.get(8)?,
    })
}

fn query_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM {} WHERE id = ?1", USER_COLUMNS, tables::USERS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        athlete_id: row.get(1)?,
        comment: row.get(2)?,
        created_at: row.get(3)?,
        status: row.get(4)?,
        distance: row.get(5)?,
        run_time_seconds: row.get(6)?,
        speed: row.get(7)?,
    })
}

fn query_run(conn: &Connection, run_id: i64) -> rusqlite::Result<Option<Run>> {
    conn.query_row(
        &format!("SELECT {} FROM {} WHERE id = ?1", RUN_COLUMNS, tables::RUNS),
        params![run_id],
        run_from_row,
    )
    .optional()
}

fn query_runs_for_athlete(conn: &Connection, athlete_id: i64) -> rusqlite::Result<Vec<Run>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} WHERE athlete_id = ?1 ORDER BY id",
        RUN_COLUMNS,
        tables::RUNS
    ))?;
    let runs = stmt
        .query_map(params![athlete_id], run_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(runs)
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Position> {
    Ok(Position {
        id: row.get(0)?,
        run_id: row.get(1)?,
        coordinate: Coordinate::new(row.get(2)?, row.get(3)?),
        date_time: row.get::<_, Option<DateTime<Utc>>>(4)?,
        distance: row.get(5)?,
        speed: row.get(6)?,
    })
}

fn query_positions(conn: &Connection, run_id: Option<i64>) -> rusqlite::Result<Vec<Position>> {
    let positions = match run_id {
        Some(run_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE run_id = ?1 ORDER BY id",
                POSITION_COLUMNS,
                tables::POSITIONS
            ))?;
            let rows = stmt.query_map(params![run_id], position_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} ORDER BY id",
                POSITION_COLUMNS,
                tables::POSITIONS
            ))?;
            let rows = stmt.query_map([], position_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(positions)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CollectibleItem> {
    Ok(CollectibleItem {
        id: row.get(0)?,
        name: row.get(1)?,
        uid: row.get(2)?,
        value: row.get(3)?,
        coordinate: Coordinate::new(row.get(4)?, row.get(5)?),
        picture: row.get(6)?,
    })
}

fn query_item(conn: &Connection, item_id: i64) -> rusqlite::Result<Option<CollectibleItem>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE id = ?1",
            ITEM_COLUMNS,
            tables::COLLECTIBLE_ITEMS
        ),
        params![item_id],
        item_from_row,
    )
    .optional()
}

fn athlete_info_or_create(conn: &Connection, user_id: i64) -> rusqlite::Result<AthleteInfo> {
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (user_id) VALUES (?1)",
            tables::ATHLETE_INFO
        ),
        params![user_id],
    )?;
    conn.query_row(
        &format!(
            "SELECT id, user_id, goals, weight FROM {} WHERE user_id = ?1",
            tables::ATHLETE_INFO
        ),
        params![user_id],
        |row| {
            Ok(AthleteInfo {
                id: row.get(0)?,
                user_id: row.get(1)?,
                goals: row.get(2)?,
                weight: row.get(3)?,
            })
        },
    )
}

fn query_subscription(
    conn: &Connection,
    coach_id: i64,
    athlete_id: i64,
) -> rusqlite::Result<Option<Subscribe>> {
    conn.query_row(
        &format!(
            "SELECT id, coach_id, athlete_id, rating FROM {} WHERE coach_id = ?1 AND athlete_id = ?2",
            tables::SUBSCRIPTIONS
        ),
        params![coach_id, athlete_id],
        |row| {
            Ok(Subscribe {
                id: row.get(0)?,
                coach_id: row.get(1)?,
                athlete_id: row.get(2)?,
                rating: row.get(3)?,
            })
        },
    )
    .optional()
}

impl ToSql for RunStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RunStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}
