//! Admin login route.

use axum::{
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use gatehouse_access::{LoginRequest, RedirectDecision};
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

use crate::extract::{CurrentPrincipal, RequestOrigin};
use crate::state::AppState;

/// Returns the last `next` value in a raw query string.
///
/// Malformed or repeated parameters never reject the request; anything
/// unusable is left for the redirector to replace with its default.
pub fn next_param(raw_query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(raw_query?.as_bytes())
        .filter(|(key, _)| key == "next")
        .map(|(_, value)| value.into_owned())
        .last()
}

/// Sends admins home, refuses non-admins, and sends everyone else to the
/// OIDC broker's login.
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    origin: RequestOrigin,
    RawQuery(raw_query): RawQuery,
) -> LoginResponse {
    let next = next_param(raw_query.as_deref());
    let requested_next = next.is_some();
    let request =
        LoginRequest::for_principal(principal.as_ref(), origin.host, origin.secure).with_next(next);

    let decision = state.redirector.decide(&request);
    if let RedirectDecision::OidcLogin(redirect) = &decision
        && requested_next
        && redirect.next().is_default()
    {
        debug!("Requested next replaced with admin home");
    }
    debug!(
        authenticated = request.access().is_authenticated(),
        access = ?request.access(),
        ?decision,
        "Admin login decided"
    );
    LoginResponse(decision)
}

/// HTTP rendering of a [`RedirectDecision`].
#[derive(Debug)]
pub struct LoginResponse(pub RedirectDecision);

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        match self.0 {
            RedirectDecision::AdminHome(path) => found(path),
            RedirectDecision::OidcLogin(redirect) => found(redirect.location()),
            RedirectDecision::Forbidden(denial) => {
                (StatusCode::FORBIDDEN, denial.message()).into_response()
            }
        }
    }
}

/// A 302, which `axum::response::Redirect` has no constructor for.
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
