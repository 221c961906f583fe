//! KeyCloak admin API client.

use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use crate::session::{AdminSession, authenticate, build_http_client};
use crate::types::{
    ClientRegistration, DirectoryUser, IdentityProviderConfig, RealmRole, UserUpdate,
};
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Page size used when listing every user in the realm.
const USER_PAGE_SIZE: usize = 100;

/// Admin session state shared by all clones of a client.
#[derive(Default)]
struct SessionState {
    session: Option<AdminSession>,
    last_error: Option<String>,
}

/// KeyCloak admin API client.
///
/// Holds one admin session, shared by every clone behind an async lock.
/// Construction never fails: if the session cannot be established the
/// client stays disconnected and every operation returns
/// [`DirectoryError::Unreachable`] without touching the network.
#[derive(Clone)]
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    http: Option<reqwest::Client>,
    state: Arc<RwLock<SessionState>>,
}

impl DirectoryClient {
    /// Creates a client and establishes the admin session.
    ///
    /// Failures are logged and recorded (see [`last_error`](Self::last_error));
    /// the returned client is then disconnected.
    pub async fn connect(config: DirectoryConfig) -> Self {
        let client = Self::disconnected(config);
        client.reconnect().await;
        client
    }

    /// Creates a client without attempting to connect.
    #[must_use]
    pub fn disconnected(config: DirectoryConfig) -> Self {
        let mut state = SessionState::default();
        let http = match build_http_client(&config) {
            Ok(http) => Some(http),
            Err(report) => {
                state.last_error = Some(report.to_string());
                None
            }
        };

        Self {
            config: Arc::new(config),
            http,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns true if an admin session is held.
    pub async fn is_connected(&self) -> bool {
        self.state.read().await.session.is_some()
    }

    /// Returns why the last connection attempt failed, if it did.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Re-runs the admin login, replacing any existing session.
    ///
    /// Returns whether the client is connected afterwards.
    #[instrument(skip(self), fields(server = %self.config.server_url(), realm = %self.config.realm()))]
    pub async fn reconnect(&self) -> bool {
        let mut state = self.state.write().await;
        match self.login().await {
            Ok(session) => {
                info!(expires_at = %session.expires_at(), "Connected to directory");
                state.session = Some(session);
                state.last_error = None;
                true
            }
            Err(report) => {
                warn!(error = %report, "Failed to connect to directory");
                state.session = None;
                state.last_error = Some(report.to_string());
                false
            }
        }
    }

    /// Drops the admin session. Later operations fail until [`reconnect`](Self::reconnect).
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        state.session = None;
        debug!("Directory session dropped");
    }

    async fn login(&self) -> Result<AdminSession, Report<DirectoryError>> {
        let http = self.http()?;
        authenticate(http, &self.config).await
    }

    fn http(&self) -> Result<&reqwest::Client, Report<DirectoryError>> {
        self.http.as_ref().ok_or_else(|| {
            DirectoryError::Unreachable {
                details: "HTTP client unavailable".to_string(),
            }
            .into()
        })
    }

    /// Returns a usable bearer token, renewing an expired session.
    ///
    /// A disconnected client is never reconnected implicitly.
    async fn bearer(&self) -> Result<String, Report<DirectoryError>> {
        {
            let state = self.state.read().await;
            match &state.session {
                None => return Err(DirectoryError::disconnected().into()),
                Some(session) if session.is_fresh(Utc::now()) => {
                    return Ok(session.access_token().to_string());
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        // Another task may have renewed or dropped the session meanwhile.
        match &state.session {
            None => return Err(DirectoryError::disconnected().into()),
            Some(session) if session.is_fresh(Utc::now()) => {
                return Ok(session.access_token().to_string());
            }
            Some(_) => {}
        }

        match self.login().await {
            Ok(session) => {
                debug!("Renewed directory admin token");
                let token = session.access_token().to_string();
                state.session = Some(session);
                Ok(token)
            }
            Err(report) => {
                warn!(error = %report, "Failed to renew directory admin token");
                state.session = None;
                state.last_error = Some(report.to_string());
                Err(report)
            }
        }
    }

    /// Sends an authorized admin API request and checks its status.
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        resource: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, Report<DirectoryError>> {
        let response = self.send_raw(method, segments, build).await?;
        ensure_success(response, resource).await
    }

    /// Like [`send`](Self::send) but leaves status handling to the caller.
    async fn send_raw(
        &self,
        method: Method,
        segments: &[&str],
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, Report<DirectoryError>> {
        let token = self.bearer().await?;
        let http = self.http()?;
        let url = self.config.admin_url(segments)?;

        let response = build(http.request(method.clone(), url.clone()).bearer_auth(token))
            .send()
            .await
            .map_err(|e| DirectoryError::Unreachable {
                details: format!("{} {}: {}", method, url, e),
            })?;

        Ok(response)
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Creates a user and returns its directory id.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: &DirectoryUser) -> Result<String, Report<DirectoryError>> {
        let response = self
            .send(Method::POST, &["users"], "user", |r| r.json(user))
            .await?;
        let id = created_id(&response)?;
        debug!(user_id = %id, "user created");
        Ok(id)
    }

    /// Fetches a user by directory id.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<DirectoryUser, Report<DirectoryError>> {
        let response = self
            .send(Method::GET, &["users", user_id], "user", |r| r)
            .await?;
        read_json(response).await
    }

    /// Finds the user with exactly this email address.
    #[instrument(skip(self))]
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
        let users = self.search_users("email", email).await?;
        Ok(users.into_iter().find(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    /// Finds the user with exactly this username.
    #[instrument(skip(self))]
    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<DirectoryUser>, Report<DirectoryError>> {
        let users = self.search_users("username", username).await?;
        Ok(users
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }

    async fn search_users(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<DirectoryUser>, Report<DirectoryError>> {
        if value.is_empty() {
            return Err(DirectoryError::InvalidInput {
                details: format!("empty {attribute} in user search"),
            }
            .into());
        }

        let response = self
            .send(Method::GET, &["users"], "users", |r| {
                r.query(&[(attribute, value), ("exact", "true")])
            })
            .await?;
        read_json(response).await
    }

    /// Applies a partial update to a user.
    #[instrument(skip(self, update))]
    pub async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<(), Report<DirectoryError>> {
        self.send(Method::PUT, &["users", user_id], "user", |r| {
            r.json(update)
        })
        .await?;
        debug!("user updated");
        Ok(())
    }

    /// Deletes a user.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), Report<DirectoryError>> {
        self.send(Method::DELETE, &["users", user_id], "user", |r| r)
            .await?;
        info!("user deleted");
        Ok(())
    }

    /// Sets a user's password.
    #[instrument(skip(self, password))]
    pub async fn set_user_password(
        &self,
        user_id: &str,
        password: &str,
        temporary: bool,
    ) -> Result<(), Report<DirectoryError>> {
        let credential = json!({
            "type": "password",
            "value": password,
            "temporary": temporary,
        });
        self.send(
            Method::PUT,
            &["users", user_id, "reset-password"],
            "user",
            |r| r.json(&credential),
        )
        .await?;
        Ok(())
    }

    /// Lists every user in the realm, page by page.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<DirectoryUser>, Report<DirectoryError>> {
        let mut users = Vec::new();
        loop {
            let first = users.len().to_string();
            let max = USER_PAGE_SIZE.to_string();
            let response = self
                .send(Method::GET, &["users"], "users", |r| {
                    r.query(&[("first", first.as_str()), ("max", max.as_str())])
                })
                .await?;
            let page: Vec<DirectoryUser> = read_json(response).await?;
            let page_len = page.len();
            users.extend(page);
            if page_len < USER_PAGE_SIZE {
                break;
            }
        }

        debug!(count = users.len(), "listed users");
        Ok(users)
    }

    // ========================================================================
    // Realm
    // ========================================================================

    /// Fetches the realm representation.
    #[instrument(skip(self))]
    pub async fn get_realm(&self) -> Result<JsonValue, Report<DirectoryError>> {
        let response = self.send(Method::GET, &[], "realm", |r| r).await?;
        read_json(response).await
    }

    /// Updates realm settings. Only the keys present in `settings` change.
    #[instrument(skip(self, settings))]
    pub async fn update_realm(&self, settings: &JsonValue) -> Result<(), Report<DirectoryError>> {
        if !settings.is_object() {
            return Err(DirectoryError::InvalidInput {
                details: "realm settings must be a JSON object".to_string(),
            }
            .into());
        }
        self.send(Method::PUT, &[], "realm", |r| r.json(settings))
            .await?;
        Ok(())
    }

    // ========================================================================
    // Clients
    // ========================================================================

    /// Finds a client by its `clientId`.
    #[instrument(skip(self))]
    pub async fn find_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, Report<DirectoryError>> {
        let response = self
            .send(Method::GET, &["clients"], "clients", |r| {
                r.query(&[("clientId", client_id)])
            })
            .await?;
        let clients: Vec<ClientRegistration> = read_json(response).await?;
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    /// Registers a client and returns its directory id.
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    pub async fn create_client(
        &self,
        client: &ClientRegistration,
    ) -> Result<String, Report<DirectoryError>> {
        let response = self
            .send(Method::POST, &["clients"], "client", |r| r.json(client))
            .await?;
        created_id(&response)
    }

    /// Replaces a client's configuration. `id` is the directory id, not the `clientId`.
    #[instrument(skip(self, client))]
    pub async fn update_client(
        &self,
        id: &str,
        client: &ClientRegistration,
    ) -> Result<(), Report<DirectoryError>> {
        self.send(Method::PUT, &["clients", id], "client", |r| {
            r.json(client)
        })
        .await?;
        Ok(())
    }

    // ========================================================================
    // Realm roles
    // ========================================================================

    /// Creates a realm role.
    #[instrument(skip(self, description))]
    pub async fn create_realm_role(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), Report<DirectoryError>> {
        let role = RealmRole::new(name, description);
        self.send(Method::POST, &["roles"], "role", |r| r.json(&role))
            .await?;
        Ok(())
    }

    /// Looks up a realm role by name; `None` if it does not exist.
    #[instrument(skip(self))]
    pub async fn find_realm_role(
        &self,
        name: &str,
    ) -> Result<Option<RealmRole>, Report<DirectoryError>> {
        let response = self
            .send_raw(Method::GET, &["roles", name], |r| r)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "role").await?;
        read_json(response).await.map(Some)
    }

    /// Grants a realm role to a user.
    #[instrument(skip(self))]
    pub async fn assign_realm_role(
        &self,
        user_id: &str,
        role_name: &str,
    ) -> Result<(), Report<DirectoryError>> {
        let role = self
            .find_realm_role(role_name)
            .await?
            .ok_or_else(|| DirectoryError::NotFound {
                resource: format!("role '{role_name}'"),
            })?;

        self.send(
            Method::POST,
            &["users", user_id, "role-mappings", "realm"],
            "user",
            |r| r.json(&[role]),
        )
        .await?;
        debug!("realm role assigned");
        Ok(())
    }

    /// Lists the realm roles directly mapped to a user.
    #[instrument(skip(self))]
    pub async fn user_realm_roles(
        &self,
        user_id: &str,
    ) -> Result<Vec<RealmRole>, Report<DirectoryError>> {
        let response = self
            .send(
                Method::GET,
                &["users", user_id, "role-mappings", "realm"],
                "user",
                |r| r,
            )
            .await?;
        read_json(response).await
    }

    // ========================================================================
    // Identity providers
    // ========================================================================

    /// Registers an upstream identity provider.
    #[instrument(skip(self, provider), fields(alias = %provider.alias))]
    pub async fn create_identity_provider(
        &self,
        provider: &IdentityProviderConfig,
    ) -> Result<(), Report<DirectoryError>> {
        self.send(
            Method::POST,
            &["identity-provider", "instances"],
            "identity provider",
            |r| r.json(provider),
        )
        .await?;
        info!("identity provider created");
        Ok(())
    }

    /// Registers Google as an upstream identity provider.
    pub async fn create_google_identity_provider(
        &self,
        google_client_id: &str,
        google_client_secret: &str,
    ) -> Result<(), Report<DirectoryError>> {
        self.create_identity_provider(&IdentityProviderConfig::google(
            google_client_id,
            google_client_secret,
        ))
        .await
    }

    /// Lists the realm's identity providers.
    #[instrument(skip(self))]
    pub async fn identity_providers(
        &self,
    ) -> Result<Vec<IdentityProviderConfig>, Report<DirectoryError>> {
        let response = self
            .send(
                Method::GET,
                &["identity-provider", "instances"],
                "identity providers",
                |r| r,
            )
            .await?;
        read_json(response).await
    }
}

/// Maps a non-success status to a typed error.
async fn ensure_success(
    response: Response,
    resource: &str,
) -> Result<Response, Report<DirectoryError>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = match status {
        StatusCode::NOT_FOUND => DirectoryError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DirectoryError::InvalidInput { details: body }
        }
        _ => DirectoryError::Rejected {
            status: status.as_u16(),
            details: body,
        },
    };
    Err(error.into())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, Report<DirectoryError>> {
    let status = response.status().as_u16();
    response.json().await.map_err(|e| {
        DirectoryError::Rejected {
            status,
            details: format!("unreadable response body: {}", e),
        }
        .into()
    })
}

/// Extracts the new entity's id from the `Location` header of a 201 response.
fn created_id(response: &Response) -> Result<String, Report<DirectoryError>> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DirectoryError::Rejected {
            status: response.status().as_u16(),
            details: "missing Location header".to_string(),
        })?;

    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DirectoryError::Rejected {
                status: response.status().as_u16(),
                details: format!("invalid Location header: {}", location),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_client_reports_not_connected() {
        let client = DirectoryClient::disconnected(DirectoryConfig::default());
        assert!(!client.is_connected().await);
        assert!(client.last_error().await.is_none());
    }

    #[tokio::test]
    async fn disconnected_client_fails_without_network() {
        let client = DirectoryClient::disconnected(DirectoryConfig::default());
        let err = client
            .get_user("abc")
            .await
            .expect_err("disconnected client must fail");
        assert_eq!(err.current_context(), &DirectoryError::disconnected());
    }

    #[tokio::test]
    async fn disconnect_clears_session() {
        let client = DirectoryClient::disconnected(DirectoryConfig::default());
        client.state.write().await.session = Some(AdminSession::new(
            "t".to_string(),
            Utc::now() + chrono::Duration::minutes(5),
        ));
        assert!(client.is_connected().await);

        client.disconnect().await;
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn clones_share_session() {
        let client = DirectoryClient::disconnected(DirectoryConfig::default());
        let clone = client.clone();
        client.state.write().await.session = Some(AdminSession::new(
            "t".to_string(),
            Utc::now() + chrono::Duration::minutes(5),
        ));
        assert!(clone.is_connected().await);
    }
}
