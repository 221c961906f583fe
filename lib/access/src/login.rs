//! Admin login redirection.
//!
//! `LoginRedirector::decide` maps the caller's access level and requested
//! destination to one of three outcomes: the admin home, a 403 denial, or a
//! redirect to the OIDC broker's login entry point.

use crate::principal::{AccessLevel, Principal};
use crate::redirect::RedirectTarget;
use crate::routes::RouteResolver;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use url::form_urlencoded;

/// Configuration for the login redirector.
///
/// Every field has a default, so an empty environment yields a working setup
/// for local development.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Path of the admin home page; also the fallback post-login destination.
    /// Default: "/admin/"
    #[serde(default = "default_admin_home")]
    admin_home: String,
    /// Route name of the OIDC login entry point in the host routing table.
    /// Default: "openid_connect_login"
    #[serde(default = "default_login_route")]
    login_route: String,
    /// Literal path used when `login_route` cannot be resolved.
    /// Default: "/accounts/openid_connect/login/"
    #[serde(default = "default_login_fallback_path")]
    login_fallback_path: String,
    /// Query parameter that selects the upstream broker.
    /// Default: "openid_connect"
    #[serde(default = "default_broker_param")]
    broker_param: String,
    /// Identifier of the upstream broker inside the OIDC provider registry.
    /// Default: "keycloak"
    #[serde(default = "default_broker_id")]
    broker_id: String,
}

fn default_admin_home() -> String {
    "/admin/".to_string()
}

fn default_login_route() -> String {
    "openid_connect_login".to_string()
}

fn default_login_fallback_path() -> String {
    "/accounts/openid_connect/login/".to_string()
}

fn default_broker_param() -> String {
    "openid_connect".to_string()
}

fn default_broker_id() -> String {
    "keycloak".to_string()
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            admin_home: default_admin_home(),
            login_route: default_login_route(),
            login_fallback_path: default_login_fallback_path(),
            broker_param: default_broker_param(),
            broker_id: default_broker_id(),
        }
    }
}

impl LoginConfig {
    /// Sets the admin home path.
    #[must_use]
    pub fn with_admin_home(mut self, path: impl Into<String>) -> Self {
        self.admin_home = path.into();
        self
    }

    /// Sets the broker identifier.
    #[must_use]
    pub fn with_broker_id(mut self, broker_id: impl Into<String>) -> Self {
        self.broker_id = broker_id.into();
        self
    }

    #[must_use]
    pub fn admin_home(&self) -> &str {
        &self.admin_home
    }

    #[must_use]
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    #[must_use]
    pub fn login_fallback_path(&self) -> &str {
        &self.login_fallback_path
    }

    #[must_use]
    pub fn broker_param(&self) -> &str {
        &self.broker_param
    }

    #[must_use]
    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }
}

/// The parts of an inbound request the redirector looks at.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    access: AccessLevel,
    next: Option<String>,
    host: String,
    secure: bool,
}

impl LoginRequest {
    /// Creates a request for the given access level.
    #[must_use]
    pub fn new(access: AccessLevel, host: impl Into<String>, secure: bool) -> Self {
        Self {
            access,
            next: None,
            host: host.into(),
            secure,
        }
    }

    /// Creates a request from an unauthenticated caller.
    #[must_use]
    pub fn anonymous(host: impl Into<String>, secure: bool) -> Self {
        Self::new(AccessLevel::Anonymous, host, secure)
    }

    /// Creates a request for an optional principal; `None` is anonymous.
    #[must_use]
    pub fn for_principal(principal: Option<&Principal>, host: impl Into<String>, secure: bool) -> Self {
        let access = principal.map_or(AccessLevel::Anonymous, Principal::access_level);
        Self::new(access, host, secure)
    }

    /// Sets the caller-supplied post-login destination.
    #[must_use]
    pub fn with_next(mut self, next: Option<String>) -> Self {
        self.next = next;
        self
    }

    #[must_use]
    pub fn access(&self) -> AccessLevel {
        self.access
    }

    #[must_use]
    pub fn next(&self) -> Option<&str> {
        self.next.as_deref()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Authenticated, but without admin privileges.
    NotStaff,
    /// The configured OIDC broker is not registered.
    BrokerUnavailable,
}

impl Denial {
    /// Returns the fixed message shown to the caller.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotStaff => "You do not have permission to access the admin site",
            Self::BrokerUnavailable => "The OpenID Connect provider is not configured",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A redirect to the OIDC broker's login entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    base_path: String,
    broker_param: String,
    broker_id: String,
    next: RedirectTarget,
}

impl LoginRedirect {
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    #[must_use]
    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }

    #[must_use]
    pub fn next(&self) -> &RedirectTarget {
        &self.next
    }

    /// Returns the query parameters in the order they are emitted.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        vec![
            ("process", "login"),
            (self.broker_param.as_str(), self.broker_id.as_str()),
            ("next", self.next.url()),
        ]
    }

    /// Returns the full `Location` value: base path plus encoded query.
    #[must_use]
    pub fn location(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.query_pairs() {
            query.append_pair(key, value);
        }
        format!("{}?{}", self.base_path, query.finish())
    }
}

/// Outcome of an admin login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Already signed in with admin privileges; go to the admin home.
    AdminHome(String),
    /// Refused with a fixed message.
    Forbidden(Denial),
    /// Send the caller through the OIDC broker.
    OidcLogin(LoginRedirect),
}

/// Decides where admin login requests go.
pub struct LoginRedirector {
    config: LoginConfig,
    routes: Box<dyn RouteResolver>,
    brokers: HashSet<String>,
}

impl fmt::Debug for LoginRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRedirector")
            .field("config", &self.config)
            .field("brokers", &self.brokers)
            .finish_non_exhaustive()
    }
}

impl LoginRedirector {
    /// Creates a redirector with no registered brokers.
    #[must_use]
    pub fn new(config: LoginConfig, routes: impl RouteResolver + 'static) -> Self {
        Self {
            config,
            routes: Box::new(routes),
            brokers: HashSet::new(),
        }
    }

    /// Registers a broker identifier as available.
    #[must_use]
    pub fn with_registered_broker(mut self, broker_id: impl Into<String>) -> Self {
        self.brokers.insert(broker_id.into());
        self
    }

    #[must_use]
    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// Returns true if the configured broker has been registered.
    #[must_use]
    pub fn broker_available(&self) -> bool {
        self.brokers.contains(self.config.broker_id())
    }

    /// Decides the outcome for one request. Never fails; problems with the
    /// route table or the `next` value are resolved by substitution.
    #[must_use]
    pub fn decide(&self, request: &LoginRequest) -> RedirectDecision {
        match request.access() {
            AccessLevel::Staff => RedirectDecision::AdminHome(self.config.admin_home.clone()),
            AccessLevel::Member => RedirectDecision::Forbidden(Denial::NotStaff),
            AccessLevel::Anonymous if !self.broker_available() => {
                tracing::warn!(
                    broker = %self.config.broker_id,
                    "OIDC broker is not registered; refusing admin login"
                );
                RedirectDecision::Forbidden(Denial::BrokerUnavailable)
            }
            AccessLevel::Anonymous => {
                let next = RedirectTarget::sanitize(
                    request.next(),
                    &self.config.admin_home,
                    request.host(),
                    request.is_secure(),
                );

                RedirectDecision::OidcLogin(LoginRedirect {
                    base_path: self.login_base_path(),
                    broker_param: self.config.broker_param.clone(),
                    broker_id: self.config.broker_id.clone(),
                    next,
                })
            }
        }
    }

    fn login_base_path(&self) -> String {
        match self.routes.resolve(&self.config.login_route) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = %self.config.login_fallback_path,
                    "Falling back to literal OIDC login path"
                );
                self.config.login_fallback_path.clone()
            }
        }
    }
}
