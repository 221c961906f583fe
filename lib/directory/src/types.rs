//! Representations exchanged with the KeyCloak admin API.
//!
//! Only the fields gatehouse reads or writes are modelled. Unknown fields in
//! responses are ignored.

use gatehouse_access::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user record in the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    /// Directory-assigned identifier. Absent until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub email_verified: bool,
}

impl DirectoryUser {
    /// Creates an enabled user with a verified email address.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: Some(email.into()),
            first_name: None,
            last_name: None,
            enabled: true,
            email_verified: true,
        }
    }

    /// Sets first and last name.
    #[must_use]
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }

    /// Sets the email-verified flag.
    #[must_use]
    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }
}

impl From<&Principal> for DirectoryUser {
    fn from(principal: &Principal) -> Self {
        Self::new(principal.username(), principal.email())
            .with_name(principal.first_name(), principal.last_name())
    }
}

/// A partial user update. Only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl From<&Principal> for UserUpdate {
    fn from(principal: &Principal) -> Self {
        Self {
            first_name: Some(principal.first_name().to_string()),
            last_name: Some(principal.last_name().to_string()),
            email: Some(principal.email().to_string()),
            username: Some(principal.username().to_string()),
            enabled: None,
        }
    }
}

/// An OAuth2/OIDC client registered in the realm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    /// Directory-assigned identifier (not the `clientId`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default)]
    pub public_client: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub web_origins: Vec<String>,
    #[serde(default)]
    pub standard_flow_enabled: bool,
    #[serde(default)]
    pub direct_access_grants_enabled: bool,
}

impl ClientRegistration {
    /// A confidential OIDC client using the authorization code flow.
    #[must_use]
    pub fn confidential(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            id: None,
            client_id: client_id.into(),
            name: None,
            enabled: true,
            protocol: Some("openid-connect".to_string()),
            public_client: false,
            secret: (!secret.is_empty()).then_some(secret),
            redirect_uris: Vec::new(),
            web_origins: Vec::new(),
            standard_flow_enabled: true,
            direct_access_grants_enabled: false,
        }
    }

    /// Sets the allowed redirect URIs.
    #[must_use]
    pub fn with_redirect_uris(mut self, uris: Vec<String>) -> Self {
        self.redirect_uris = uris;
        self
    }

    /// Sets the allowed web origins.
    #[must_use]
    pub fn with_web_origins(mut self, origins: Vec<String>) -> Self {
        self.web_origins = origins;
        self
    }
}

/// A realm-scoped role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub composite: bool,
}

impl RealmRole {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            id: None,
            name: name.into(),
            description: (!description.is_empty()).then_some(description),
            composite: false,
        }
    }
}

/// An upstream identity provider brokered by the realm.
///
/// Provider-specific settings live in `config` as plain strings; the accepted
/// keys depend on the provider type and the KeyCloak version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfig {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub provider_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl IdentityProviderConfig {
    /// Creates an enabled provider with an empty config map.
    #[must_use]
    pub fn new(alias: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            display_name: None,
            provider_id: provider_id.into(),
            enabled: true,
            config: BTreeMap::new(),
        }
    }

    /// Google social login broker.
    #[must_use]
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self::new("google", "google")
            .with_display_name("Google")
            .with_config("clientId", client_id)
            .with_config("clientSecret", client_secret)
            .with_config("defaultScope", "openid profile email")
            .with_config("trustEmail", "true")
            .with_config("storeToken", "true")
            .with_config("addReadTokenRoleOnCreate", "true")
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets one provider-specific config key.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Which branch `sync_principal` took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No record matched the principal's email; one was created.
    Created {
        /// The new directory id.
        id: String,
    },
    /// An existing record was updated in place.
    Updated {
        /// The existing directory id.
        id: String,
    },
}

impl SyncOutcome {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Created { id } | Self::Updated { id } => id,
        }
    }
}
