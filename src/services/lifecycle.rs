// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Run lifecycle: start, position ingestion, and stop.
//!
//! Operations on the same run are serialized with a per-run async lock, and
//! every status change is additionally a compare-and-set in the store. Stopping
//! a run computes its distance from the recorded path and evaluates the
//! achievement catalog in the same transaction that marks it finished.

use crate::db::{Database, FinishedRun};
use crate::error::AppError;
use crate::models::{Coordinate, NewPosition, Position, Run, RunAction};
use crate::services::{achievements, collectibles, distance};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-run locks, shared by every clone of the service.
pub type RunLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// Held lock on one run. Dropping it releases the lock and removes the map
/// entry once no other task holds or waits on it.
struct RunGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: RunLocks,
    run_id: i64,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the shard lock, so a count of one means
        // only the map still refers to this mutex.
        self.locks
            .remove_if(&self.run_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Returned (after the run is persisted as finished) when the path is too short.
pub const NOT_ENOUGH_POSITIONS: &str = "Run stopped. Not enough positions to calculate distance.";

/// Run lifecycle service.
#[derive(Clone)]
pub struct RunService {
    db: Database,
    locks: RunLocks,
}

impl RunService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock_run(&self, run_id: i64) -> RunGuard {
        let lock = self
            .locks
            .entry(run_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        RunGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            run_id,
        }
    }

    /// Move a run from `init` to `in_progress`.
    pub async fn start(&self, run_id: i64) -> Result<Run, AppError> {
        let _guard = self.lock_run(run_id).await;

        let run = self.db.start_run(run_id)?;
        tracing::info!(run_id, athlete_id = run.athlete_id, "Run started");
        Ok(run)
    }

    /// Record a GPS fix for an in-progress run.
    ///
    /// The coordinate is rounded to stored precision, cumulative distance and
    /// segment speed are derived from the previous fix, and any collectible
    /// item within range is credited to the run's athlete.
    pub async fn ingest_position(
        &self,
        run_id: i64,
        coordinate: Coordinate,
        date_time: Option<DateTime<Utc>>,
    ) -> Result<Position, AppError> {
        if !coordinate.is_valid() {
            return Err(AppError::BadRequest(format!(
                "Coordinates out of range: ({}, {})",
                coordinate.latitude, coordinate.longitude
            )));
        }

        let _guard = self.lock_run(run_id).await;

        let run = self
            .db
            .get_run(run_id)?
            .ok_or_else(|| AppError::BadRequest(format!("Run {} does not exist", run_id)))?;
        run.status.accepts_positions()?;

        let coordinate = coordinate.to_stored_precision();
        let previous = self.db.last_position(run_id)?;
        let metrics = distance::segment_metrics(previous.as_ref(), coordinate, date_time);

        let position = self.db.insert_position(
            &NewPosition {
                run_id,
                coordinate,
                date_time,
            },
            metrics,
        )?;

        tracing::debug!(
            run_id,
            position_id = position.id,
            distance_km = position.distance,
            speed = position.speed,
            "Position recorded"
        );

        // The position is committed; pickup failures are only logged.
        if let Err(e) = self.collect_nearby(run.athlete_id, coordinate) {
            tracing::warn!(
                run_id,
                athlete_id = run.athlete_id,
                error = %e,
                "Item pickup failed"
            );
        }

        Ok(position)
    }

    fn collect_nearby(&self, athlete_id: i64, coordinate: Coordinate) -> Result<(), AppError> {
        let items = self.db.list_items()?;
        for item in collectibles::items_in_range(coordinate, &items) {
            if self.db.collect_item(item.id, athlete_id)? {
                tracing::info!(
                    athlete_id,
                    item_id = item.id,
                    item = %item.name,
                    "Item collected"
                );
            }
        }
        Ok(())
    }

    /// Finish an in-progress run.
    ///
    /// With fewer than two positions the run is still finished with zero
    /// distance and achievements are still evaluated, but the caller gets
    /// [`AppError::InsufficientData`].
    pub async fn stop(&self, run_id: i64) -> Result<FinishedRun, AppError> {
        let guard = self.lock_run(run_id).await;

        // Fail fast on a bad transition before touching positions.
        let run = self
            .db
            .get_run(run_id)?
            .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;
        run.status.transition(RunAction::Stop)?;

        let path: Vec<Coordinate> = self
            .db
            .positions_for_run(run_id)?
            .into_iter()
            .map(|p| p.coordinate)
            .collect();
        let distance_km = distance::run_distance(&path);

        let db = self.db.clone();
        let finished = tokio::task::spawn_blocking(move || {
            db.finish_run(run_id, distance_km.unwrap_or(0.0), achievements::evaluate)
        })
        .await
        .map_err(anyhow::Error::from)??;

        drop(guard);

        tracing::info!(
            run_id,
            athlete_id = finished.run.athlete_id,
            distance_km = finished.run.distance,
            positions = path.len(),
            unlocked = ?finished.unlocked,
            "Run finished"
        );

        if distance_km.is_none() {
            tracing::warn!(run_id, positions = path.len(), "Run finished without a path");
            return Err(AppError::InsufficientData(NOT_ENOUGH_POSITIONS));
        }

        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RunQuery;
    use crate::models::{NewCollectibleItem, NewUser, RunStatus};
    use chrono::TimeZone;

    fn setup() -> (RunService, Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                username: "runner".to_string(),
                ..NewUser::default()
            })
            .unwrap();
        (RunService::new(db.clone()), db, user.id)
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();

        assert_eq!(service.start(run.id).await.unwrap().status, RunStatus::InProgress);
        let err = service.start(run.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState("Invalid run status for starting.")));
    }

    #[tokio::test]
    async fn test_stop_requires_in_progress() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();

        let err = service.stop(run.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState("Invalid run status for stopping.")));
        assert_eq!(db.get_run(run.id).unwrap().unwrap().status, RunStatus::Init);
    }

    #[tokio::test]
    async fn test_stop_computes_distance() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();

        service
            .ingest_position(run.id, Coordinate::new(0.001, 0.001), None)
            .await
            .unwrap();
        service
            .ingest_position(run.id, Coordinate::new(0.010, 0.011), None)
            .await
            .unwrap();

        let finished = service.stop(run.id).await.unwrap();
        assert_eq!(finished.run.status, RunStatus::Finished);
        assert_eq!(finished.run.distance, 1.493);
    }

    #[tokio::test]
    async fn test_stop_with_single_position_still_finishes() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();
        service
            .ingest_position(run.id, Coordinate::new(10.0, 10.0), None)
            .await
            .unwrap();

        let err = service.stop(run.id).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientData(NOT_ENOUGH_POSITIONS)));

        let run = db.get_run(run.id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Finished);
        assert_eq!(run.distance, 0.0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_unknown_and_idle_runs() {
        let (service, db, athlete) = setup();

        let err = service
            .ingest_position(999, Coordinate::new(1.0, 1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let run = db.create_run(athlete, "").unwrap();
        let err = service
            .ingest_position(run.id, Coordinate::new(1.0, 1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(db.positions_for_run(run.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_out_of_range_coordinates() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();

        for bad in [Coordinate::new(91.0, 0.0), Coordinate::new(0.0, -180.5)] {
            let err = service.ingest_position(run.id, bad, None).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
        assert!(db.positions_for_run(run.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rounds_and_derives_metrics() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let first = service
            .ingest_position(run.id, Coordinate::new(0.001_04, 0.000_96), Some(t0))
            .await
            .unwrap();
        assert_eq!(first.coordinate, Coordinate::new(0.001, 0.001));
        assert_eq!((first.distance, first.speed), (0.0, 0.0));

        let second = service
            .ingest_position(
                run.id,
                Coordinate::new(0.010, 0.011),
                Some(t0 + chrono::Duration::seconds(300)),
            )
            .await
            .unwrap();
        assert_eq!(second.distance, 1.49);
        assert_eq!(second.speed, 4.98);

        let run = db.get_run(run.id).unwrap().unwrap();
        assert_eq!(run.run_time_seconds, Some(300));
        assert_eq!(run.speed, Some(2.49));
    }

    #[tokio::test]
    async fn test_item_collected_once() {
        let (service, db, athlete) = setup();
        let item = db
            .create_item(&NewCollectibleItem {
                name: "flag".to_string(),
                uid: "f-1".to_string(),
                value: 5,
                coordinate: Coordinate::new(10.0, 20.0),
                picture: String::new(),
            })
            .unwrap();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();

        for _ in 0..3 {
            service
                .ingest_position(run.id, Coordinate::new(10.0003, 20.0), None)
                .await
                .unwrap();
        }

        assert_eq!(db.items_collected_by(athlete).unwrap(), vec![item]);
    }

    #[tokio::test]
    async fn test_pickup_failure_keeps_position() {
        let (service, db, athlete) = setup();
        db.create_item(&NewCollectibleItem {
            name: "flag".to_string(),
            uid: "f-1".to_string(),
            value: 5,
            coordinate: Coordinate::new(10.0, 20.0),
            picture: String::new(),
        })
        .unwrap();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();
        db.execute_batch("DROP TABLE item_collections").unwrap();

        let position = service
            .ingest_position(run.id, Coordinate::new(10.0003, 20.0), None)
            .await
            .unwrap();

        let stored: Vec<i64> = db
            .positions_for_run(run.id)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(stored, vec![position.id]);
    }

    #[tokio::test]
    async fn test_lock_entries_released() {
        let (service, db, athlete) = setup();

        for id in 1000..1100 {
            assert!(service.start(id).await.is_err());
            assert!(service
                .ingest_position(id, Coordinate::new(1.0, 1.0), None)
                .await
                .is_err());
            assert!(service.stop(id).await.is_err());
        }
        assert!(service.locks.is_empty());

        let short = db.create_run(athlete, "").unwrap();
        service.start(short.id).await.unwrap();
        service
            .ingest_position(short.id, Coordinate::new(1.0, 1.0), None)
            .await
            .unwrap();
        assert!(service.stop(short.id).await.is_err());

        let open = db.create_run(athlete, "").unwrap();
        service.start(open.id).await.unwrap();
        assert!(db.delete_run(open.id).unwrap());

        assert!(service.locks.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stops_finish_once() {
        let (service, db, athlete) = setup();
        let run = db.create_run(athlete, "").unwrap();
        service.start(run.id).await.unwrap();
        for c in [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.03)] {
            service.ingest_position(run.id, c, None).await.unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.stop(run.id).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        let finished = db
            .list_runs(&RunQuery {
                status: Some(RunStatus::Finished),
                ..RunQuery::default()
            })
            .unwrap();
        assert_eq!(finished.len(), 1);
    }
}
