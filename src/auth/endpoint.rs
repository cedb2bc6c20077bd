//! Vendor OAuth token endpoint
//!
//! Endpoint: https://api.fitbit.com/oauth2/token
//! Auth: HTTP Basic with client id / secret, form-encoded body.

use super::Credential;
use crate::error::AuthError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use urlencoding::encode;

pub const DEFAULT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const DEFAULT_SCOPES: &str = "activity heartrate sleep profile";

/// Token endpoint response body
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TokenResponse {
    /// Stamp the relative expiry against `now`
    pub fn into_credential(self, now: i64) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + self.expires_in,
            scope: self.scope,
            user_id: self.user_id,
        }
    }
}

#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;

    /// One-time authorization-code exchange
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;
}

pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl HttpTokenEndpoint {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Endpoint(e.to_string()))?;

        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        })
    }

    /// Browser URL the participant visits to grant access
    pub fn authorization_url(&self, authorize_url: &str, scopes: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            authorize_url,
            encode(&self.client_id),
            encode(&self.redirect_uri),
            encode(scopes),
        )
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Endpoint(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshRejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(AuthError::Endpoint(format!("token endpoint returned {}", status)));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Endpoint(format!("malformed token response: {}", e)))
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }
}
