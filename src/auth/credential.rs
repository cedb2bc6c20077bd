use serde::{Deserialize, Serialize};

/// OAuth credential as persisted on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    #[serde(default)]
    pub scope: String,
    /// Vendor user id, when the token endpoint reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Credential {
    /// True when the credential expires at or before `now + margin_secs`
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at <= now + margin_secs
    }
}
