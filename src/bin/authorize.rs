//! Authorize - one-time OAuth authorization
//!
//! Without arguments, prints the vendor authorization URL. After granting access,
//! pass the `code` query parameter from the redirect:
//!
//!   cargo run --bin authorize
//!   cargo run --bin authorize -- --code <CODE>
//!
//! The resulting credential is written atomically to WEARFLOW_TOKEN_FILE.

use dotenv::dotenv;
use log::info;
use std::env;
use std::sync::Arc;
use wearflow::auth::endpoint::{DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPES};
use wearflow::auth::{FileTokenStore, HttpTokenEndpoint, OAuthTokenManager};
use wearflow::config::AppConfig;
use wearflow::time::system_clock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let (client_id, client_secret) = config.oauth_client()?;
    let endpoint = HttpTokenEndpoint::new(
        config.token_url.clone(),
        client_id,
        client_secret,
        config.redirect_uri.clone(),
    )?;

    let args: Vec<String> = env::args().collect();
    let code = args
        .iter()
        .position(|a| a == "--code")
        .and_then(|idx| args.get(idx + 1));

    let Some(code) = code else {
        println!("Open this URL, grant access, then rerun with --code <CODE>:");
        println!("{}", endpoint.authorization_url(DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPES));
        return Ok(());
    };

    let manager = OAuthTokenManager::new(
        Arc::new(FileTokenStore::new(&config.token_file)),
        Arc::new(endpoint),
        config.token_margin_secs,
        system_clock(),
    );
    let credential = manager.authorize_with_code(code).await?;

    info!("✅ Credential stored in {}", config.token_file);
    if let Some(user_id) = credential.user_id {
        info!("   └─ Participant: {}", user_id);
    }
    Ok(())
}
