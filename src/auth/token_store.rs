//! Credential persistence
//!
//! The credential file is replaced with write-then-rename, so a crash mid-save
//! leaves either the old file or the new one, never a torn record.

use super::Credential;
use crate::error::AuthError;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing usable is stored yet
    fn load(&self) -> Result<Option<Credential>, AuthError>;

    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// On-disk shape. Also accepts the vendor's raw token JSON, which carries
/// `last_refreshed` + `expires_in` instead of `expires_at`.
#[derive(Debug, Deserialize)]
struct StoredCredential {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    last_refreshed: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

impl StoredCredential {
    fn into_credential(self) -> Option<Credential> {
        let access_token = self.access_token?;
        let refresh_token = self.refresh_token?;

        let expires_at = match (self.expires_at, self.last_refreshed, self.expires_in) {
            (Some(at), _, _) => at,
            (None, Some(refreshed), Some(expires_in)) => {
                match crate::time::parse_vendor_datetime(&refreshed) {
                    Some(ts) => ts + expires_in,
                    None => {
                        log::warn!("⚠️  Malformed last_refreshed '{}', treating token as expired", refreshed);
                        0
                    }
                }
            }
            _ => {
                log::warn!("⚠️  Stored credential has no expiry, treating token as expired");
                0
            }
        };

        Some(Credential {
            access_token,
            refresh_token,
            expires_at,
            scope: self.scope.unwrap_or_default(),
            user_id: self.user_id,
        })
    }
}

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.path.exists() {
            log::info!("No credential file found: {}", self.path.display());
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Store(format!("{}: {}", self.path.display(), e)))?;
        if json.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<StoredCredential>(&json) {
            Ok(stored) => {
                let credential = stored.into_credential();
                if credential.is_none() {
                    log::warn!("⚠️  {} lacks access_token/refresh_token", self.path.display());
                }
                Ok(credential)
            }
            Err(e) => {
                log::warn!("⚠️  {} is not valid credential JSON ({}), ignoring it", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let to_store_err = |e: std::io::Error| AuthError::Store(format!("{}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(to_store_err)?;
            }
        }

        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(to_store_err)?;
            file.write_all(json.as_bytes()).map_err(to_store_err)?;
            file.sync_all().map_err(to_store_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(to_store_err)?;

        log::debug!("Saved credential to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn credential(expires_at: i64) -> Credential {
        Credential {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            scope: "activity heartrate sleep".to_string(),
            user_id: Some("ABC123".to_string()),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&credential(5_000)).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential(5_000)));

        // No temp file left behind
        assert!(!dir.path().join("tokens.json.tmp").exists());
    }

    #[test]
    fn test_load_legacy_vendor_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(
            &path,
            r#"{
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 28800,
                "last_refreshed": "1970-01-01T00:00:00.000000",
                "scope": "heartrate",
                "token_type": "Bearer",
                "user_id": "XYZ"
            }"#,
        )
        .unwrap();

        let loaded = FileTokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.expires_at, 28_800);
        assert_eq!(loaded.user_id.as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_missing_expiry_treated_as_expired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, r#"{"access_token": "a", "refresh_token": "r"}"#).unwrap();

        let loaded = FileTokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.expires_at, 0);
    }

    #[test]
    fn test_garbage_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{not json").unwrap();

        assert!(FileTokenStore::new(&path).load().unwrap().is_none());
    }
}
