//! Authentication command handlers.
//!
//! This module implements the CLI commands for:
//! - `budget auth set-token` - Store an access token obtained elsewhere
//! - `budget auth status` - Report whether the stored token is usable

use crate::api::{save_token, AccessToken, Session};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// What `budget auth status` found.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthStatus {
    pub signed_in: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Handles the `budget auth set-token` command.
///
/// Writes the token to the configured token path, readable only by the current user. When
/// `expires_in` is given the token is considered signed out once that many seconds have passed.
///
/// # Errors
/// - `Validation` if the token is empty.
/// - `Config` if the token file cannot be written.
pub async fn set_token(config: &Config, token: &str, expires_in: Option<u64>) -> Result<Out<()>> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ErrorType::Validation.err("The access token is empty").into());
    }
    let expires_at = expires_in.and_then(|secs| {
        let secs = i64::try_from(secs).ok()?;
        Utc::now().checked_add_signed(Duration::try_seconds(secs)?)
    });
    save_token(config.token_path(), &AccessToken::new(token, expires_at))
        .await
        .context("Unable to save the access token")
        .pub_result(ErrorType::Config)?;
    Ok(format!("Saved the access token to {}", config.token_path().display()).into())
}

/// Handles the `budget auth status` command. Never contacts Google.
pub async fn auth_status(config: &Config) -> Result<Out<AuthStatus>> {
    let session = Session::load(config.token_path()).await;
    let status = AuthStatus {
        signed_in: session.is_signed_in(),
        expires_at: session.token().and_then(AccessToken::expires_at),
    };
    let message = match (status.signed_in, status.expires_at) {
        (true, Some(expiry)) => format!("Signed in, the token expires at {expiry}"),
        (true, None) => "Signed in".to_string(),
        (false, Some(expiry)) => {
            format!("Not signed in, the token expired at {expiry}")
        }
        (false, _) => "Not signed in. Provide an access token with 'budget auth set-token'".into(),
    };
    Ok(Out::new(message, status))
}
