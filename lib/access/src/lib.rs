//! Admin-area access decisions for gatehouse.
//!
//! This crate provides:
//! - The host application's user record (`Principal`, `AccessLevel`)
//! - Open-redirect protection for post-login destinations (`RedirectTarget`)
//! - Named route resolution with literal fallbacks (`RouteResolver`, `NamedRoutes`)
//! - The login redirector that sends anonymous admin visitors to the OIDC broker
//!
//! # Access Model
//!
//! Admin pages are gated on two flags the host application maintains:
//! - An authenticated, staff principal goes straight to the admin home
//! - An authenticated, non-staff principal is refused with a fixed 403 message
//! - Anyone else is sent to the OIDC broker's login entry point
//!
//! # Example
//!
//! ```
//! use gatehouse_access::{
//!     LoginConfig, LoginRedirector, LoginRequest, NamedRoutes, RedirectDecision,
//! };
//!
//! let routes = NamedRoutes::new().with_route("openid_connect_login", "/accounts/oidc/login/");
//! let redirector = LoginRedirector::new(LoginConfig::default(), routes)
//!     .with_registered_broker("keycloak");
//!
//! let request = LoginRequest::anonymous("app.example.com", true)
//!     .with_next(Some("https://evil.example/phish".to_string()));
//!
//! match redirector.decide(&request) {
//!     RedirectDecision::OidcLogin(redirect) => {
//!         assert_eq!(redirect.next().url(), "/admin/");
//!         assert!(redirect.location().starts_with("/accounts/oidc/login/?process=login"));
//!     }
//!     other => panic!("unexpected decision: {other:?}"),
//! }
//! ```

pub mod error;
pub mod login;
pub mod principal;
pub mod redirect;
pub mod routes;

// Re-export main types at crate root
pub use error::RouteError;
pub use login::{Denial, LoginConfig, LoginRedirect, LoginRedirector, LoginRequest, RedirectDecision};
pub use principal::{AccessLevel, Principal};
pub use redirect::{RedirectTarget, TargetSource, is_safe_redirect};
pub use routes::{NamedRoutes, RouteResolver};
