//! Request extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use gatehouse_access::Principal;
use std::convert::Infallible;
use std::sync::Arc;

use crate::state::AppState;

/// The caller's principal, if the host's authentication layer attached one.
///
/// Authentication happens upstream; a [`Principal`] in the request
/// extensions is trusted as-is. No principal means anonymous.
pub struct CurrentPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentPrincipal(parts.extensions.get::<Principal>().cloned()))
    }
}

/// Host and transport security of the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    /// `Host` header value (may include a port). Empty if absent or not in
    /// the allowed hosts.
    pub host: String,
    /// Whether the request arrived over HTTPS.
    pub secure: bool,
}

/// Whether `host` (port ignored) matches one of `allowed`.
///
/// An empty list accepts everything. Entries are exact host names, `*`, or
/// `.example.com` for the domain and all its subdomains.
#[must_use]
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let name = strip_port(host).to_ascii_lowercase();
    if name.is_empty() {
        return false;
    }
    allowed.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*" {
            return true;
        }
        match pattern.strip_prefix('.') {
            Some(domain) => name == domain || name.ends_with(pattern.as_str()),
            None => name == pattern,
        }
    })
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map_or(host, |(addr, _)| &host[..=addr.len()]);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);

        let mut host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();

        if !host_allowed(&host, &app_state.allowed_hosts) {
            tracing::warn!(%host, "Host not in allowed hosts; treating as unknown");
            host.clear();
        }

        let forwarded_https = app_state.trust_forwarded_proto
            && parts
                .headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        let secure = forwarded_https || parts.uri.scheme_str() == Some("https");

        Ok(RequestOrigin { host, secure })
    }
}
