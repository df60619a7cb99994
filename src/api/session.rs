//! The signed-in session. Obtaining an access token (the OAuth consent flow) happens outside of
//! this program; the token is handed over with `budget auth set-token` and kept in
//! `$BUDGET_HOME/.secrets/token.json`.

use crate::error::{ErrorType, Res};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// The content of `token.json`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccessToken {
    access_token: String,
    /// When the token stops working. `None` means the expiry is unknown and the token is assumed
    /// to be valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Whether there is a usable access token. Every row store call is gated on this.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<AccessToken>,
}

impl Session {
    /// Loads the session from `token_path`. A missing, unreadable or expired token results in a
    /// signed-out session rather than an error, so that commands can report `NotAuthenticated`.
    pub async fn load(token_path: &Path) -> Self {
        if !token_path.is_file() {
            debug!("No token found at {}", token_path.display());
            return Self::signed_out();
        }
        match utils::deserialize::<AccessToken>(token_path).await {
            Ok(token) => Self { token: Some(token) },
            Err(e) => {
                warn!("Ignoring the unreadable token file: {e:#}");
                Self::signed_out()
            }
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: AccessToken) -> Self {
        Self { token: Some(token) }
    }

    /// A session for the in-memory test sheet.
    pub(crate) fn testing() -> Self {
        Self::with_token(AccessToken::new("test-token", None))
    }

    pub fn is_signed_in(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.access_token.is_empty() && !t.is_expired(Utc::now()))
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    /// Fails with `NotAuthenticated` unless signed in.
    pub(crate) fn ensure_signed_in(&self) -> Res<()> {
        if self.is_signed_in() {
            Ok(())
        } else {
            Err(ErrorType::NotAuthenticated.err(
                "Not signed in. Provide an access token with 'budget auth set-token'",
            ))
        }
    }

    /// The raw token, empty when there is none.
    pub(crate) fn token_value(&self) -> String {
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .unwrap_or_default()
    }
}

/// Writes `token` to `token_path`, readable only by the current user.
pub async fn save_token(token_path: &Path, token: &AccessToken) -> Res<()> {
    let data = serde_json::to_string_pretty(token)?;
    utils::write_secret(token_path, data).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_token_is_signed_out() {
        let dir = TempDir::new().unwrap();
        let session = Session::load(&dir.path().join("token.json")).await;
        assert!(!session.is_signed_in());
        let e = session.ensure_signed_in().unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_save_and_load_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        let token = AccessToken::new("abc", Some(Utc::now() + Duration::hours(1)));
        save_token(&path, &token).await.unwrap();

        let session = Session::load(&path).await;
        assert!(session.is_signed_in());
        assert_eq!(session.token(), Some(&token));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_expired_token_is_signed_out() {
        let token = AccessToken::new("abc", Some(Utc::now() - Duration::minutes(1)));
        assert!(!Session::with_token(token).is_signed_in());
        assert!(!Session::with_token(AccessToken::new("", None)).is_signed_in());
        assert!(Session::testing().is_signed_in());
    }

    #[tokio::test]
    async fn test_garbage_token_is_signed_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(!Session::load(&path).await.is_signed_in());
    }
}
