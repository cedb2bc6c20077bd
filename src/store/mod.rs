//! Time-indexed SQLite store for raw points, rollups, imputed points and the cursor
//!
//! Tables (see `sql/`):
//! - `raw_data`      - UPSERT on (timestamp, participant_id, metric_type)
//! - `rollups`       - regenerated per resolution by the rollup refresh job
//! - `imputed_data`  - delete-range + insert per imputation run, in one transaction
//! - `ingest_cursor` - single row, advanced in the same transaction as the raw upsert
//!
//! All access goes through one connection behind a mutex, so statements from
//! different callers never interleave. Multi-statement writes run in a transaction.
//! A served page reads its rows and its total count under one lock hold, inside one
//! read transaction, so both see the same state.

pub mod rollup;
pub mod types;

use crate::error::StorageError;
use crate::metrics::{MetricType, RollupValue};
use crate::sqlite_pragma::apply_optimized_pragmas;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use types::{
    ImputedPoint, IngestCursor, RawPoint, RollupResolution, RollupRow, SeriesKey, SeriesRow,
};

/// Schema files, applied in order. Each uses IF NOT EXISTS so reapplying is a no-op.
const MIGRATIONS: &[(&str, &str)] = &[
    ("00_raw_data.sql", include_str!("../../sql/00_raw_data.sql")),
    ("01_rollups.sql", include_str!("../../sql/01_rollups.sql")),
    ("02_imputed_data.sql", include_str!("../../sql/02_imputed_data.sql")),
    ("03_ingest_cursor.sql", include_str!("../../sql/03_ingest_cursor.sql")),
];

/// Run schema migrations
///
/// Idempotent: every statement is `CREATE ... IF NOT EXISTS`.
pub fn run_schema_migrations(conn: &Connection) -> Result<(), StorageError> {
    log::debug!("🔧 Running {} schema migrations", MIGRATIONS.len());

    for (name, sql) in MIGRATIONS {
        conn.execute_batch(sql)?;
        log::debug!("   ├─ ✅ {}", name);
    }

    Ok(())
}

/// Outcome of committing one delta-load batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub rows_upserted: usize,
    /// Imputed rows dropped because an observed point now exists at their key
    pub imputed_superseded: usize,
    pub cursor: i64,
}

#[derive(Clone)]
pub struct TimeSeriesStore {
    conn: Arc<Mutex<Connection>>,
}

impl TimeSeriesStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        apply_optimized_pragmas(&conn)?;
        run_schema_migrations(&conn)?;

        log::info!("✅ Time-series store ready: {}", db_path.as_ref().display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database (tests, tooling)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        run_schema_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Run several reads under one lock hold and one read transaction
    fn read_consistent<T>(
        &self,
        read: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = read(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Cursor + ingestion
    // ------------------------------------------------------------------

    pub fn read_cursor(&self) -> Result<Option<IngestCursor>, StorageError> {
        let conn = self.lock()?;
        let ts: Option<i64> = conn
            .query_row(
                "SELECT last_success_timestamp FROM ingest_cursor WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(ts.map(|last_success_timestamp| IngestCursor {
            last_success_timestamp,
        }))
    }

    /// Upsert a run's rows and advance the cursor as one transaction
    ///
    /// The cursor never moves backwards: the stored value becomes
    /// `MAX(stored, new_cursor)`. Imputed rows sharing a key with an incoming
    /// observed point are removed so the two tables stay disjoint.
    pub fn commit_ingest_batch(
        &self,
        points: &[RawPoint],
        new_cursor: i64,
        now: i64,
    ) -> Result<CommitSummary, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let (rows_upserted, imputed_superseded) = upsert_points(&tx, points)?;

        tx.execute(
            "INSERT INTO ingest_cursor (id, last_success_timestamp, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                last_success_timestamp = MAX(last_success_timestamp, excluded.last_success_timestamp),
                updated_at = excluded.updated_at",
            params![new_cursor, now],
        )?;

        let cursor: i64 = tx.query_row(
            "SELECT last_success_timestamp FROM ingest_cursor WHERE id = 1",
            [],
            |row| row.get(0),
        )?;

        tx.commit()?;

        Ok(CommitSummary {
            rows_upserted,
            imputed_superseded,
            cursor,
        })
    }

    /// Upsert rows without touching the cursor (synthetic data, backfills)
    pub fn upsert_raw(&self, points: &[RawPoint]) -> Result<usize, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let (rows, _) = upsert_points(&tx, points)?;
        tx.commit()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Raw reads
    // ------------------------------------------------------------------

    pub fn count_raw(&self, key: &SeriesKey<'_>) -> Result<i64, StorageError> {
        count_raw(&*self.lock()?, key)
    }

    /// One page of raw rows and the full matching count, read together
    pub fn read_raw_window(
        &self,
        key: &SeriesKey<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SeriesRow>, i64), StorageError> {
        self.read_consistent(|conn| Ok((raw_page(conn, key, limit, offset)?, count_raw(conn, key)?)))
    }

    /// Numeric observations in range, ascending. Text-only rows are skipped.
    pub fn read_numeric_series(&self, key: &SeriesKey<'_>) -> Result<Vec<(i64, f64)>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, value_numeric FROM raw_data
             WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4
               AND value_numeric IS NOT NULL
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(
            params![key.participant_id, key.metric_type.as_str(), key.start, key.end],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// First and last observed timestamp for a pair, if any
    pub fn raw_extent(
        &self,
        participant_id: &str,
        metric_type: MetricType,
    ) -> Result<Option<(i64, i64)>, StorageError> {
        let conn = self.lock()?;
        let extent: (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM raw_data
             WHERE participant_id = ?1 AND metric_type = ?2",
            params![participant_id, metric_type.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(match extent {
            (Some(first), Some(last)) => Some((first, last)),
            _ => None,
        })
    }

    // ------------------------------------------------------------------
    // Rollup reads
    // ------------------------------------------------------------------

    /// One page of rollup rows and the full matching count, read together
    pub fn read_rollup_window(
        &self,
        resolution: RollupResolution,
        value: RollupValue,
        key: &SeriesKey<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SeriesRow>, i64), StorageError> {
        self.read_consistent(|conn| {
            Ok((
                rollup_page(conn, resolution, value, key, limit, offset)?,
                count_rollup(conn, resolution, key)?,
            ))
        })
    }

    // ------------------------------------------------------------------
    // Imputed data
    // ------------------------------------------------------------------

    /// Observed and imputed rows merged, ordered by (timestamp, participant_id), with
    /// the full merged count
    ///
    /// A concurrent imputation run lands either entirely before or entirely after.
    pub fn read_with_imputed_window(
        &self,
        key: &SeriesKey<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SeriesRow>, i64), StorageError> {
        self.read_consistent(|conn| {
            Ok((
                with_imputed_page(conn, key, limit, offset)?,
                count_with_imputed(conn, key)?,
            ))
        })
    }

    /// Replace every imputed row of a pair in `[key.start, key.end]` with `points`
    ///
    /// Delete and insert share one transaction. Points landing on an observed key
    /// are skipped. Returns the number of rows inserted.
    pub fn replace_imputed(
        &self,
        key: &SeriesKey<'_>,
        points: &[ImputedPoint],
    ) -> Result<usize, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM imputed_data
             WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4",
            params![key.participant_id, key.metric_type.as_str(), key.start, key.end],
        )?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO imputed_data (timestamp, participant_id, metric_type, value_numeric, is_imputed)
                 SELECT ?1, ?2, ?3, ?4, 1
                 WHERE NOT EXISTS (
                     SELECT 1 FROM raw_data
                     WHERE timestamp = ?1 AND participant_id = ?2 AND metric_type = ?3
                 )",
            )?;
            for point in points {
                inserted += stmt.execute(params![
                    point.timestamp,
                    point.participant_id,
                    point.metric_type.as_str(),
                    point.value_numeric,
                ])?;
            }
        }

        tx.commit()?;

        log::debug!(
            "♻️  Replaced imputed rows for {}/{}: -{} +{}",
            key.participant_id,
            key.metric_type,
            removed,
            inserted
        );

        Ok(inserted)
    }

    /// Imputed rows in range, ascending
    pub fn read_imputed(&self, key: &SeriesKey<'_>) -> Result<Vec<ImputedPoint>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, participant_id, value_numeric FROM imputed_data
             WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4
             ORDER BY timestamp ASC",
        )?;

        let metric_type = key.metric_type;
        let rows = stmt.query_map(
            params![key.participant_id, key.metric_type.as_str(), key.start, key.end],
            |row| {
                Ok(ImputedPoint {
                    timestamp: row.get(0)?,
                    participant_id: row.get(1)?,
                    metric_type,
                    value_numeric: row.get(2)?,
                })
            },
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

// ----------------------------------------------------------------------
// Page and count statements
// ----------------------------------------------------------------------

fn count_raw(conn: &Connection, key: &SeriesKey<'_>) -> Result<i64, StorageError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM raw_data
         WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4",
        params![key.participant_id, key.metric_type.as_str(), key.start, key.end],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn raw_page(
    conn: &Connection,
    key: &SeriesKey<'_>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SeriesRow>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, participant_id, value_numeric, value_text
         FROM raw_data
         WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4
         ORDER BY timestamp ASC, participant_id ASC
         LIMIT ?5 OFFSET ?6",
    )?;

    let rows = stmt.query_map(
        params![key.participant_id, key.metric_type.as_str(), key.start, key.end, limit, offset],
        |row| {
            Ok(SeriesRow {
                timestamp: row.get(0)?,
                participant_id: row.get(1)?,
                value_numeric: row.get(2)?,
                value_text: row.get(3)?,
                is_imputed: false,
            })
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn count_rollup(
    conn: &Connection,
    resolution: RollupResolution,
    key: &SeriesKey<'_>,
) -> Result<i64, StorageError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM rollups
         WHERE resolution = ?1 AND participant_id = ?2 AND metric_type = ?3
           AND bucket_start BETWEEN ?4 AND ?5",
        params![
            resolution.seconds(),
            key.participant_id,
            key.metric_type.as_str(),
            resolution.bucket_start(key.start),
            key.end
        ],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn rollup_page(
    conn: &Connection,
    resolution: RollupResolution,
    value: RollupValue,
    key: &SeriesKey<'_>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SeriesRow>, StorageError> {
    let column = match value {
        RollupValue::Avg => "avg",
        RollupValue::Sum => "sum",
    };
    let sql = format!(
        "SELECT bucket_start, participant_id, {}
         FROM rollups
         WHERE resolution = ?1 AND participant_id = ?2 AND metric_type = ?3
           AND bucket_start BETWEEN ?4 AND ?5
         ORDER BY bucket_start ASC, participant_id ASC
         LIMIT ?6 OFFSET ?7",
        column
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(
        params![
            resolution.seconds(),
            key.participant_id,
            key.metric_type.as_str(),
            resolution.bucket_start(key.start),
            key.end,
            limit,
            offset
        ],
        |row| {
            Ok(SeriesRow {
                timestamp: row.get(0)?,
                participant_id: row.get(1)?,
                value_numeric: row.get(2)?,
                value_text: None,
                is_imputed: false,
            })
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn count_with_imputed(conn: &Connection, key: &SeriesKey<'_>) -> Result<i64, StorageError> {
    let count = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM raw_data
             WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4)
          + (SELECT COUNT(*) FROM imputed_data
             WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4)",
        params![key.participant_id, key.metric_type.as_str(), key.start, key.end],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn with_imputed_page(
    conn: &Connection,
    key: &SeriesKey<'_>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SeriesRow>, StorageError> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, participant_id, value_numeric, value_text, 0 AS is_imputed
         FROM raw_data
         WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4
         UNION ALL
         SELECT timestamp, participant_id, value_numeric, NULL, 1
         FROM imputed_data
         WHERE participant_id = ?1 AND metric_type = ?2 AND timestamp BETWEEN ?3 AND ?4
         ORDER BY 1 ASC, 2 ASC, 5 ASC
         LIMIT ?5 OFFSET ?6",
    )?;

    let rows = stmt.query_map(
        params![key.participant_id, key.metric_type.as_str(), key.start, key.end, limit, offset],
        |row| {
            Ok(SeriesRow {
                timestamp: row.get(0)?,
                participant_id: row.get(1)?,
                value_numeric: row.get(2)?,
                value_text: row.get(3)?,
                is_imputed: row.get::<_, i64>(4)? != 0,
            })
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// UPSERT raw rows and drop imputed rows they supersede
fn upsert_points(
    tx: &rusqlite::Transaction<'_>,
    points: &[RawPoint],
) -> Result<(usize, usize), StorageError> {
    let mut upserted = 0;
    let mut superseded = 0;

    let mut upsert = tx.prepare_cached(
        "INSERT INTO raw_data (timestamp, participant_id, metric_type, value_numeric, value_text)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(timestamp, participant_id, metric_type) DO UPDATE SET
            value_numeric = excluded.value_numeric,
            value_text = excluded.value_text",
    )?;
    let mut drop_imputed = tx.prepare_cached(
        "DELETE FROM imputed_data
         WHERE timestamp = ?1 AND participant_id = ?2 AND metric_type = ?3",
    )?;

    for point in points {
        upserted += upsert.execute(params![
            point.timestamp,
            point.participant_id,
            point.metric_type.as_str(),
            point.value_numeric,
            point.value_text,
        ])?;
        superseded += drop_imputed.execute(params![
            point.timestamp,
            point.participant_id,
            point.metric_type.as_str(),
        ])?;
    }

    Ok((upserted, superseded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(start: i64, end: i64) -> SeriesKey<'static> {
        SeriesKey {
            participant_id: "p1",
            metric_type: MetricType::HeartRate,
            start,
            end,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let points: Vec<RawPoint> = (0..10)
            .map(|i| RawPoint::numeric(1_000 + i, "p1", MetricType::HeartRate, 70.0 + i as f64))
            .collect();

        store.upsert_raw(&points).unwrap();
        store.upsert_raw(&points).unwrap();

        assert_eq!(store.count_raw(&key(0, 10_000)).unwrap(), 10);
    }

    #[test]
    fn test_upsert_overwrites_value() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        store
            .upsert_raw(&[RawPoint::numeric(5, "p1", MetricType::HeartRate, 60.0)])
            .unwrap();
        store
            .upsert_raw(&[RawPoint::numeric(5, "p1", MetricType::HeartRate, 65.0)])
            .unwrap();

        let (rows, _) = store.read_raw_window(&key(0, 10), 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value_numeric, Some(65.0));
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        assert!(store.read_cursor().unwrap().is_none());

        let summary = store.commit_ingest_batch(&[], 500, 1).unwrap();
        assert_eq!(summary.cursor, 500);

        let summary = store.commit_ingest_batch(&[], 300, 2).unwrap();
        assert_eq!(summary.cursor, 500);
        assert_eq!(store.read_cursor().unwrap().unwrap().last_success_timestamp, 500);
    }

    #[test]
    fn test_ingest_supersedes_imputed_point() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let imputed = ImputedPoint {
            timestamp: 120,
            participant_id: "p1".to_string(),
            metric_type: MetricType::HeartRate,
            value_numeric: 72.0,
        };
        store.replace_imputed(&key(0, 600), &[imputed]).unwrap();

        let summary = store
            .commit_ingest_batch(&[RawPoint::numeric(120, "p1", MetricType::HeartRate, 80.0)], 600, 1)
            .unwrap();
        assert_eq!(summary.imputed_superseded, 1);
        assert!(store.read_imputed(&key(0, 600)).unwrap().is_empty());
    }

    #[test]
    fn test_replace_imputed_skips_observed_keys() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        store
            .upsert_raw(&[RawPoint::numeric(60, "p1", MetricType::HeartRate, 70.0)])
            .unwrap();

        let points: Vec<ImputedPoint> = [0, 60, 120]
            .iter()
            .map(|&ts| ImputedPoint {
                timestamp: ts,
                participant_id: "p1".to_string(),
                metric_type: MetricType::HeartRate,
                value_numeric: 1.0,
            })
            .collect();

        let inserted = store.replace_imputed(&key(0, 120), &points).unwrap();
        assert_eq!(inserted, 2);

        // Second run with fewer points fully replaces the first
        let inserted = store.replace_imputed(&key(0, 120), &points[..1]).unwrap();
        assert_eq!(inserted, 1);
        let stored = store.read_imputed(&key(0, 120)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].timestamp, 0);
    }

    #[test]
    fn test_merged_view_orders_and_flags_rows() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        store
            .upsert_raw(&[
                RawPoint::numeric(0, "p1", MetricType::HeartRate, 70.0),
                RawPoint::numeric(120, "p1", MetricType::HeartRate, 74.0),
            ])
            .unwrap();
        store
            .replace_imputed(
                &key(0, 120),
                &[ImputedPoint {
                    timestamp: 60,
                    participant_id: "p1".to_string(),
                    metric_type: MetricType::HeartRate,
                    value_numeric: 72.0,
                }],
            )
            .unwrap();

        let (rows, total) = store.read_with_imputed_window(&key(0, 120), 10, 0).unwrap();
        assert_eq!(total, 3);
        let flags: Vec<(i64, bool)> = rows.iter().map(|r| (r.timestamp, r.is_imputed)).collect();
        assert_eq!(flags, vec![(0, false), (60, true), (120, false)]);
    }

    #[test]
    fn test_open_creates_file_with_wal() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("wearflow.db");
        let _store = TimeSeriesStore::open(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_raw_extent() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        assert!(store.raw_extent("p1", MetricType::Steps).unwrap().is_none());
        store
            .upsert_raw(&[
                RawPoint::numeric(300, "p1", MetricType::Steps, 1.0),
                RawPoint::numeric(100, "p1", MetricType::Steps, 2.0),
            ])
            .unwrap();
        assert_eq!(store.raw_extent("p1", MetricType::Steps).unwrap(), Some((100, 300)));
    }

    #[test]
    fn test_windows_pair_page_with_full_count() {
        let store = TimeSeriesStore::open_in_memory().unwrap();
        let points: Vec<RawPoint> = (0..7)
            .map(|i| RawPoint::numeric(i * 60, "p1", MetricType::HeartRate, 70.0))
            .collect();
        store.upsert_raw(&points).unwrap();
        store
            .replace_imputed(
                &key(0, 600),
                &[ImputedPoint {
                    timestamp: 30,
                    participant_id: "p1".to_string(),
                    metric_type: MetricType::HeartRate,
                    value_numeric: 70.0,
                }],
            )
            .unwrap();
        store.refresh_rollups(RollupResolution::Minute, 0, 600).unwrap();

        let (rows, total) = store.read_raw_window(&key(0, 600), 3, 3).unwrap();
        assert_eq!(total, 7);
        let stamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![180, 240, 300]);

        let (rows, total) = store.read_with_imputed_window(&key(0, 600), 2, 0).unwrap();
        assert_eq!(total, 8);
        let flags: Vec<(i64, bool)> = rows.iter().map(|r| (r.timestamp, r.is_imputed)).collect();
        assert_eq!(flags, vec![(0, false), (30, true)]);

        let (rows, total) = store
            .read_rollup_window(RollupResolution::Minute, RollupValue::Avg, &key(0, 600), 10, 5)
            .unwrap();
        assert_eq!(total, 7);
        assert_eq!(rows.len(), 2);
    }
}
