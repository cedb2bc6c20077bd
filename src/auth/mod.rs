//! OAuth credential lifecycle
//!
//! - `credential` - the persisted credential record
//! - `token_store` - atomic file persistence
//! - `endpoint` - vendor token endpoint (refresh / code exchange)
//! - `manager` - hands out credentials valid past the safety margin

pub mod credential;
pub mod endpoint;
pub mod manager;
pub mod token_store;

pub use credential::Credential;
pub use endpoint::{HttpTokenEndpoint, TokenEndpoint, TokenResponse};
pub use manager::OAuthTokenManager;
pub use token_store::{FileTokenStore, TokenStore};
