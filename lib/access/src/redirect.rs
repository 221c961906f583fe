//! Post-login destinations and open-redirect protection.
//!
//! A caller-supplied `next` value is only ever passed through when it points
//! back at the host that received the request. Everything else is replaced by
//! the default destination.

use url::Url;

/// Where a redirect destination came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    /// The caller supplied it and it passed validation.
    Caller,
    /// The configured default was substituted.
    Default,
}

/// A validated post-login destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    url: String,
    source: TargetSource,
}

impl RedirectTarget {
    /// Returns a target pointing at the default destination.
    #[must_use]
    pub fn default_to(default: impl Into<String>) -> Self {
        Self {
            url: default.into(),
            source: TargetSource::Default,
        }
    }

    /// Validates a caller-supplied destination against the request origin.
    ///
    /// Missing, empty, and unsafe values all fall back to `default`.
    #[must_use]
    pub fn sanitize(next: Option<&str>, default: &str, request_host: &str, secure: bool) -> Self {
        match next {
            Some(candidate) if is_safe_redirect(candidate, request_host, secure) => Self {
                url: candidate.to_string(),
                source: TargetSource::Caller,
            },
            Some(candidate) => {
                tracing::debug!(
                    next = %candidate,
                    host = %request_host,
                    secure,
                    "Discarding unsafe redirect target"
                );
                Self::default_to(default)
            }
            None => Self::default_to(default),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn source(&self) -> TargetSource {
        self.source
    }

    /// Returns true if the default destination was substituted.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.source == TargetSource::Default
    }
}

/// Returns true if `url` is safe to redirect to from a request on `allowed_host`.
///
/// Host-relative URLs are safe. Absolute and scheme-relative URLs must name
/// `allowed_host` (port included, default ports ignored) and use `http` or
/// `https`; when `require_https` is set only `https` is accepted.
#[must_use]
pub fn is_safe_redirect(url: &str, allowed_host: &str, require_https: bool) -> bool {
    if url.is_empty() || url.trim() != url {
        return false;
    }

    // Browsers treat backslashes as slashes and drop control characters,
    // either of which can turn a path into a foreign host.
    if url.chars().any(|c| c.is_control() || c == '\\') {
        return false;
    }

    if url.starts_with("///") {
        return false;
    }

    let request_scheme = if require_https { "https" } else { "http" };
    let candidate = if url.starts_with("//") {
        format!("{request_scheme}:{url}")
    } else {
        url.to_string()
    };

    match Url::parse(&candidate) {
        Ok(parsed) => absolute_url_allowed(&parsed, allowed_host, require_https),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

fn absolute_url_allowed(parsed: &Url, allowed_host: &str, require_https: bool) -> bool {
    let scheme_allowed = match parsed.scheme() {
        "https" => true,
        "http" => !require_https,
        _ => false,
    };
    if !scheme_allowed {
        return false;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };

    // `Url::port` is None when the port is the scheme default.
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    authority.eq_ignore_ascii_case(&normalize_host(allowed_host, parsed.scheme()))
}

fn normalize_host(host: &str, scheme: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let default_port = match scheme {
        "https" => ":443",
        _ => ":80",
    };
    match host.strip_suffix(default_port) {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}
