//! Admin session acquisition.
//!
//! The admin API is authorized with a bearer token obtained through the
//! resource-owner password grant against the master realm.

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, ClientId, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername,
    TokenResponse, TokenUrl,
};
use rootcause::prelude::Report;

/// Tokens are renewed this long before they expire.
const EXPIRY_SKEW_SECONDS: i64 = 10;

/// Lifetime assumed when the token response carries no `expires_in`.
const DEFAULT_LIFETIME_SECONDS: i64 = 60;

/// An authenticated admin API session.
#[derive(Clone)]
pub struct AdminSession {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl AdminSession {
    #[must_use]
    pub fn new(access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the token can still be used at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECONDS) < self.expires_at
    }
}

impl std::fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSession")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Builds the HTTP client used for both the token grant and admin calls.
///
/// Redirects are never followed; the admin API does not use them and the
/// token endpoint must not be redirected elsewhere.
pub(crate) fn build_http_client(
    config: &DirectoryConfig,
) -> Result<reqwest::Client, Report<DirectoryError>> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.request_timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs())
        .build()
        .map_err(|e| {
            DirectoryError::InvalidInput {
                details: format!("failed to create HTTP client: {}", e),
            }
            .into()
        })
}

/// Runs the password grant and returns a fresh session.
pub(crate) async fn authenticate(
    http: &reqwest::Client,
    config: &DirectoryConfig,
) -> Result<AdminSession, Report<DirectoryError>> {
    let token_url = TokenUrl::new(config.token_url()).map_err(|e| DirectoryError::InvalidInput {
        details: format!("invalid token URL: {}", e),
    })?;

    // admin-cli is a public client; its id goes in the request body.
    let client = BasicClient::new(ClientId::new(config.admin_client_id().to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(token_url);

    let username = ResourceOwnerUsername::new(config.admin_username().to_string());
    let password = ResourceOwnerPassword::new(config.admin_password().to_string());

    let response = client
        .exchange_password(&username, &password)
        .request_async(http)
        .await
        .map_err(|e| match &e {
            RequestTokenError::ServerResponse(_) => DirectoryError::Rejected {
                status: 401,
                details: format!("admin login refused: {}", e),
            },
            RequestTokenError::Request(_) => DirectoryError::Unreachable {
                details: format!("token request failed: {}", e),
            },
            _ => DirectoryError::Rejected {
                status: 502,
                details: format!("unusable token response: {}", e),
            },
        })?;

    let lifetime = response
        .expires_in()
        .and_then(|d| Duration::from_std(d).ok())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_LIFETIME_SECONDS));

    Ok(AdminSession::new(
        response.access_token().secret().clone(),
        Utc::now() + lifetime,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_is_fresh_before_skew_window() {
        let now = Utc::now();
        let session = AdminSession::new("t".to_string(), now + Duration::seconds(60));
        assert!(session.is_fresh(now));
    }

    #[test]
    fn session_is_stale_inside_skew_window() {
        let now = Utc::now();
        let session = AdminSession::new("t".to_string(), now + Duration::seconds(5));
        assert!(!session.is_fresh(now));
    }

    #[test]
    fn debug_redacts_token() {
        let session = AdminSession::new("secret-token".to_string(), Utc::now());
        assert!(!format!("{session:?}").contains("secret-token"));
    }

    #[test]
    fn http_client_builds_from_defaults() {
        assert!(build_http_client(&DirectoryConfig::default()).is_ok());
    }
}
