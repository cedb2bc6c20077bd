//! Credential handout with refresh-ahead
//!
//! `get_valid_credential` returns a credential that stays valid for at least
//! `margin_secs`. Refreshes are serialized: concurrent callers wait on one refresh
//! and then reuse the persisted result instead of spending the refresh token twice.

use super::{Credential, TokenEndpoint, TokenStore};
use crate::error::AuthError;
use crate::time::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct OAuthTokenManager {
    store: Arc<dyn TokenStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    margin_secs: i64,
    now_fn: Clock,
    refresh_guard: Mutex<()>,
}

impl OAuthTokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        margin_secs: i64,
        now_fn: Clock,
    ) -> Self {
        Self {
            store,
            endpoint,
            margin_secs,
            now_fn,
            refresh_guard: Mutex::new(()),
        }
    }

    pub fn margin_secs(&self) -> i64 {
        self.margin_secs
    }

    /// Stored credential if still valid past the margin, otherwise a refreshed one
    pub async fn get_valid_credential(&self) -> Result<Credential, AuthError> {
        let current = self.store.load()?.ok_or(AuthError::MissingCredential)?;
        if !current.expires_within((self.now_fn)(), self.margin_secs) {
            return Ok(current);
        }

        let _guard = self.refresh_guard.lock().await;

        // Another caller may have refreshed while we waited
        let current = self.store.load()?.ok_or(AuthError::MissingCredential)?;
        if !current.expires_within((self.now_fn)(), self.margin_secs) {
            return Ok(current);
        }

        log::info!(
            "🔑 Access token expires at {} (margin {}s), refreshing",
            current.expires_at,
            self.margin_secs
        );
        self.refresh_locked(&current).await
    }

    /// Refresh regardless of the stored expiry (after a vendor 401)
    pub async fn force_refresh(&self) -> Result<Credential, AuthError> {
        let _guard = self.refresh_guard.lock().await;
        let current = self.store.load()?.ok_or(AuthError::MissingCredential)?;
        log::warn!("🔑 Forcing token refresh after an unauthorized response");
        self.refresh_locked(&current).await
    }

    /// Exchange an authorization code and persist the first credential
    pub async fn authorize_with_code(&self, code: &str) -> Result<Credential, AuthError> {
        let _guard = self.refresh_guard.lock().await;
        let response = self.endpoint.exchange_code(code).await?;
        let credential = response.into_credential((self.now_fn)());
        self.store.save(&credential)?;
        log::info!("✅ Authorization complete, token valid until {}", credential.expires_at);
        Ok(credential)
    }

    async fn refresh_locked(&self, current: &Credential) -> Result<Credential, AuthError> {
        let response = self.endpoint.refresh(&current.refresh_token).await?;
        let now = (self.now_fn)();
        let mut refreshed = response.into_credential(now);

        // Vendor omits user_id on some refresh responses
        if refreshed.user_id.is_none() {
            refreshed.user_id = current.user_id.clone();
        }

        // Persist first: the old refresh token is already spent
        self.store.save(&refreshed)?;

        if refreshed.expires_within(now, self.margin_secs) {
            return Err(AuthError::ShortLived {
                expires_in: refreshed.expires_at - now,
                margin: self.margin_secs,
            });
        }

        log::info!("✅ Token refreshed, valid until {}", refreshed.expires_at);
        Ok(refreshed)
    }
}
