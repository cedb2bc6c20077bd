//! Run-lock for delta loads
//!
//! In-process exclusion uses an atomic flag. When a lock file is configured, it is
//! created with `create_new`, so a second process sees it and skips. A lock file
//! older than `stale_secs` is left over from a crashed run and gets broken.

use crate::time::Clock;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

pub struct RunLock {
    held: Arc<AtomicBool>,
    lock_file: Option<PathBuf>,
    stale_secs: i64,
    now_fn: Clock,
}

/// Releases the lock on drop
pub struct RunLockGuard {
    held: Arc<AtomicBool>,
    lock_file: Option<PathBuf>,
}

impl RunLock {
    pub fn in_memory(now_fn: Clock) -> Self {
        Self {
            held: Arc::new(AtomicBool::new(false)),
            lock_file: None,
            stale_secs: 0,
            now_fn,
        }
    }

    pub fn with_file(path: impl AsRef<Path>, stale_secs: i64, now_fn: Clock) -> Self {
        Self {
            held: Arc::new(AtomicBool::new(false)),
            lock_file: Some(path.as_ref().to_path_buf()),
            stale_secs,
            now_fn,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// `None` when another run holds the lock
    pub fn try_acquire(&self) -> Option<RunLockGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        if let Some(path) = &self.lock_file {
            if !self.create_lock_file(path) {
                self.held.store(false, Ordering::SeqCst);
                return None;
            }
        }

        Some(RunLockGuard {
            held: self.held.clone(),
            lock_file: self.lock_file.clone(),
        })
    }

    fn create_lock_file(&self, path: &Path) -> bool {
        if try_create(path, (self.now_fn)()) {
            return true;
        }

        // Break a lock left behind by a crashed run
        let now = (self.now_fn)();
        let stale = match lock_started_at(path) {
            Some(started_at) => now - started_at > self.stale_secs,
            // Vanished between create and read: the holder just released it
            None => false,
        };
        if !stale {
            return false;
        }

        log::warn!("🔓 Breaking stale run lock {}", path.display());
        if let Err(e) = fs::remove_file(path) {
            log::error!("❌ Could not remove stale lock {}: {}", path.display(), e);
            return false;
        }
        try_create(path, now)
    }
}

/// Start stamp written by the holder, else the file's mtime
///
/// The stamp is written after `create_new`, so a reader can see an empty file
/// that belongs to a live run.
fn lock_started_at(path: &Path) -> Option<i64> {
    let stamp = fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok());
    if stamp.is_some() {
        return stamp;
    }

    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

fn try_create(path: &Path, now: i64) -> bool {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            if let Err(e) = write!(file, "{}", now) {
                log::warn!("⚠️  Could not stamp run lock {}: {}", path.display(), e);
            }
            true
        }
        Err(_) => false,
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.lock_file {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("⚠️  Could not remove run lock {}: {}", path.display(), e);
            }
        }
        self.held.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, system_clock};
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let lock = RunLock::in_memory(fixed_clock(0));

        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_lock_file_excludes_other_process() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delta_load.lock");

        // Another process holds a fresh lock
        fs::write(&path, "1000").unwrap();
        let lock = RunLock::with_file(&path, 3_600, fixed_clock(1_500));
        assert!(lock.try_acquire().is_none());
        assert!(!lock.is_held());

        // Same lock file, but old enough to be stale
        let lock = RunLock::with_file(&path, 3_600, fixed_clock(10_000));
        let guard = lock.try_acquire().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "10000");

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_unstamped_lock_file_ages_by_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("delta_load.lock");

        // Holder created the file but has not written its stamp yet
        fs::write(&path, "").unwrap();
        let lock = RunLock::with_file(&path, 3_600, system_clock());
        assert!(lock.try_acquire().is_none());
        assert!(path.exists());

        // Same empty file seen from far in the future is stale
        let later = chrono::Utc::now().timestamp() + 10 * 3_600;
        let lock = RunLock::with_file(&path, 3_600, fixed_clock(later));
        let guard = lock.try_acquire().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), later.to_string());
        drop(guard);
    }
}
