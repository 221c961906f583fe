//! Directory (KeyCloak admin API) configuration.

use crate::error::DirectoryError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Configuration for the directory admin client.
///
/// The defaults point at a local KeyCloak started with its stock
/// `admin`/`admin` bootstrap account. They are only suitable for local
/// development.
#[derive(Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the KeyCloak server (e.g., "https://sso.example.com").
    /// Default: "http://localhost:8080"
    #[serde(default = "default_server_url")]
    server_url: String,
    /// Realm that users, clients, and roles are managed in.
    /// Default: "myrealm"
    #[serde(default = "default_realm")]
    realm: String,
    /// Bootstrap admin username in the master realm.
    /// Default: "admin"
    #[serde(default = "default_admin")]
    admin_username: String,
    /// Bootstrap admin password in the master realm.
    /// Default: "admin"
    #[serde(default = "default_admin")]
    admin_password: String,
    /// Client used for the admin password grant.
    /// Default: "admin-cli"
    #[serde(default = "default_admin_client_id")]
    admin_client_id: String,
    /// Client id of the application registered in `realm`.
    /// Default: "django-app"
    #[serde(default = "default_client_id")]
    client_id: String,
    /// Client secret of the application registered in `realm`.
    #[serde(default)]
    client_secret: String,
    /// Timeout applied to every request to the provider, in seconds.
    /// Default: 10
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
    /// Skip TLS certificate verification. Only for local self-signed setups.
    #[serde(default)]
    accept_invalid_certs: bool,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_realm() -> String {
    "myrealm".to_string()
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_admin_client_id() -> String {
    "admin-cli".to_string()
}

fn default_client_id() -> String {
    "django-app".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            realm: default_realm(),
            admin_username: default_admin(),
            admin_password: default_admin(),
            admin_client_id: default_admin_client_id(),
            client_id: default_client_id(),
            client_secret: String::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
            accept_invalid_certs: false,
        }
    }
}

impl DirectoryConfig {
    /// Creates a configuration for the given server and realm, with defaults
    /// for everything else.
    #[must_use]
    pub fn new(server_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            realm: realm.into(),
            ..Self::default()
        }
    }

    /// Sets the bootstrap admin credentials.
    #[must_use]
    pub fn with_admin_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.admin_username = username.into();
        self.admin_password = password.into();
        self
    }

    /// Sets the application client credentials.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self.client_secret = secret.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_seconds = timeout.as_secs().max(1);
        self
    }

    #[must_use]
    pub fn server_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    #[must_use]
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    #[must_use]
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    #[must_use]
    pub fn admin_client_id(&self) -> &str {
        &self.admin_client_id
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    #[must_use]
    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    /// Token endpoint of the master realm, used for the admin password grant.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/master/protocol/openid-connect/token",
            self.server_url()
        )
    }

    /// Admin API URL for the managed realm, with `segments` appended.
    ///
    /// Each segment is percent-encoded on its own, so ids and names holding
    /// `/`, `#` or `?` stay inside their segment.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidInput`] if the server URL cannot carry
    /// a path.
    pub fn admin_url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let invalid = |details: String| DirectoryError::InvalidInput { details };
        let mut url = Url::parse(self.server_url())
            .map_err(|e| invalid(format!("server URL '{}': {}", self.server_url(), e)))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("server URL '{}' cannot be a base", self.server_url())))?
            .pop_if_empty()
            .extend(["admin", "realms", self.realm.as_str()])
            .extend(segments);
        Ok(url)
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("admin_client_id", &self.admin_client_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_keycloak() {
        let config = DirectoryConfig::default();
        assert_eq!(config.server_url(), "http://localhost:8080");
        assert_eq!(config.realm(), "myrealm");
        assert_eq!(config.admin_username(), "admin");
        assert_eq!(config.admin_password(), "admin");
        assert_eq!(config.admin_client_id(), "admin-cli");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(!config.accept_invalid_certs());
    }

    #[test]
    fn urls_ignore_trailing_slash() {
        let config = DirectoryConfig::new("https://sso.example.com/", "corp");
        assert_eq!(
            config.token_url(),
            "https://sso.example.com/realms/master/protocol/openid-connect/token"
        );
        assert_eq!(
            config.admin_url(&["users"]).expect("url").as_str(),
            "https://sso.example.com/admin/realms/corp/users"
        );
        assert_eq!(
            config.admin_url(&[]).expect("url").as_str(),
            "https://sso.example.com/admin/realms/corp"
        );
    }

    #[test]
    fn admin_url_encodes_each_segment() {
        let config = DirectoryConfig::new("https://sso.example.com/auth", "corp");
        assert_eq!(
            config.admin_url(&["roles", "ops#eu"]).expect("url").as_str(),
            "https://sso.example.com/auth/admin/realms/corp/roles/ops%23eu"
        );
        assert_eq!(
            config
                .admin_url(&["users", "a/b?c", "role-mappings", "realm"])
                .expect("url")
                .as_str(),
            "https://sso.example.com/auth/admin/realms/corp/users/a%2Fb%3Fc/role-mappings/realm"
        );
    }

    #[test]
    fn admin_url_rejects_unusable_server_url() {
        let config = DirectoryConfig::new("not a url", "corp");
        assert!(matches!(
            config.admin_url(&["users"]),
            Err(DirectoryError::InvalidInput { .. })
        ));
        let config = DirectoryConfig::new("mailto:admin@example.com", "corp");
        assert!(config.admin_url(&[]).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = DirectoryConfig::default()
            .with_admin_credentials("root", "hunter2")
            .with_client("app", "s3cr3t");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("root"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"server_url": "https://sso.example.com", "realm": "corp"}"#;
        let config: DirectoryConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.realm(), "corp");
        assert_eq!(config.client_id(), "django-app");
        assert_eq!(config.client_secret(), "");
    }

    #[test]
    fn timeout_is_at_least_one_second() {
        let config = DirectoryConfig::default().with_request_timeout(Duration::from_millis(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
