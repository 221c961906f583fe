//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`LoginConfig`](gatehouse_access::LoginConfig) and
//! [`DirectoryConfig`](gatehouse_directory::DirectoryConfig) for the
//! library-level sections.

use gatehouse_access::LoginConfig;
use gatehouse_directory::{ClientRegistration, DirectoryConfig, IdentityProviderConfig, ProvisionPlan};
use serde::Deserialize;
use std::collections::HashMap;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Whether `X-Forwarded-Proto` from a fronting proxy decides if a request
    /// was made over HTTPS. Only enable behind a proxy that sets it.
    #[serde(default)]
    pub trust_forwarded_proto: bool,

    /// Register the login broker without checking the realm for the
    /// application client.
    #[serde(default)]
    pub assume_broker_registered: bool,

    /// Hosts the `Host` header may name: exact names, `.domain` for a domain
    /// and its subdomains, or `*`. Empty accepts any host.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// Named route table of the host application (route name to path).
    #[serde(default)]
    pub routes: HashMap<String, String>,

    /// Admin login redirection.
    #[serde(default)]
    pub login: LoginConfig,

    /// KeyCloak admin API access.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Realm provisioning at startup.
    #[serde(default)]
    pub provision: ProvisionConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

/// Startup provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    /// Run provisioning when the server starts.
    #[serde(default)]
    pub enabled: bool,

    /// Public base URL of the application, used for the client's redirect
    /// URIs and web origins.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    /// Realm roles to ensure exist.
    #[serde(default)]
    pub realm_roles: Vec<String>,

    /// Google OAuth client id. The Google broker is provisioned only when
    /// both id and secret are set.
    #[serde(default)]
    pub google_client_id: Option<String>,

    #[serde(default)]
    pub google_client_secret: Option<String>,
}

fn default_app_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            app_base_url: default_app_base_url(),
            realm_roles: Vec::new(),
            google_client_id: None,
            google_client_secret: None,
        }
    }
}

impl ProvisionConfig {
    /// Builds the provisioning plan for the application client described by
    /// `directory`.
    #[must_use]
    pub fn plan(&self, directory: &DirectoryConfig) -> ProvisionPlan {
        let base = self.app_base_url.trim_end_matches('/');
        let client = ClientRegistration::confidential(directory.client_id(), directory.client_secret())
            .with_redirect_uris(vec![format!("{base}/*")])
            .with_web_origins(vec![base.to_string()]);

        let realm_roles = self
            .realm_roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| (r.to_string(), String::new()))
            .collect();

        let identity_providers = match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                vec![IdentityProviderConfig::google(id, secret)]
            }
            _ => Vec::new(),
        };

        ProvisionPlan {
            client: Some(client),
            realm_roles,
            identity_providers,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    pub(crate) fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allowed_hosts")
                    .with_list_parse_key("provision.realm_roles")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
