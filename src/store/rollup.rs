//! Rollup regeneration
//!
//! The rollup refresh job rebuilds buckets from `raw_data` for a recent window.
//! Query serving only reads these rows and tolerates them lagging behind raw data
//! by up to one refresh interval.

use super::{RollupResolution, RollupRow, TimeSeriesStore};
use crate::error::StorageError;
use crate::metrics::MetricType;
use rusqlite::params;

impl TimeSeriesStore {
    /// Rebuild every bucket of `resolution` overlapping `[since, until]`
    ///
    /// Delete-range + aggregate insert in one transaction. Returns the number of
    /// buckets written.
    pub fn refresh_rollups(
        &self,
        resolution: RollupResolution,
        since: i64,
        until: i64,
    ) -> Result<usize, StorageError> {
        let width = resolution.seconds();
        let from = resolution.bucket_start(since);
        // Extend to the end of the bucket containing `until` so it is rebuilt whole
        let to = resolution.bucket_start(until) + width - 1;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM rollups WHERE resolution = ?1 AND bucket_start BETWEEN ?2 AND ?3",
            params![width, from, to],
        )?;

        let written = tx.execute(
            "INSERT INTO rollups (resolution, bucket_start, participant_id, metric_type, avg, sum, count)
             SELECT ?1,
                    timestamp - (timestamp % ?1) AS bucket,
                    participant_id,
                    metric_type,
                    AVG(value_numeric),
                    SUM(value_numeric),
                    COUNT(value_numeric)
             FROM raw_data
             WHERE timestamp BETWEEN ?2 AND ?3 AND value_numeric IS NOT NULL
             GROUP BY bucket, participant_id, metric_type",
            params![width, from, to],
        )?;

        tx.commit()?;

        log::info!(
            "📊 Rollup {} refreshed: {} buckets in [{}, {}]",
            resolution,
            written,
            from,
            to
        );

        Ok(written)
    }

    /// Buckets of one pair, ascending (refresh tooling and tests)
    pub fn read_rollups(
        &self,
        resolution: RollupResolution,
        participant_id: &str,
        metric_type: MetricType,
    ) -> Result<Vec<RollupRow>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT bucket_start, participant_id, avg, sum, count FROM rollups
             WHERE resolution = ?1 AND participant_id = ?2 AND metric_type = ?3
             ORDER BY bucket_start ASC",
        )?;

        let rows = stmt.query_map(
            params![resolution.seconds(), participant_id, metric_type.as_str()],
            |row| {
                Ok(RollupRow {
                    bucket_start: row.get(0)?,
                    resolution,
                    participant_id: row.get(1)?,
                    metric_type,
                    avg: row.get(2)?,
                    sum: row.get(3)?,
                    count: row.get(4)?,
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
