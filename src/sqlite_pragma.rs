//! Shared SQLite connection tuning

use rusqlite::Connection;

/// Apply the pragmas every wearflow connection runs with.
///
/// - WAL so API readers see a consistent snapshot while ingestion writes
/// - NORMAL sync (safe under WAL)
/// - busy timeout so a short writer lock doesn't surface as SQLITE_BUSY
pub fn apply_optimized_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -16000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1000)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}
