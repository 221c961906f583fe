//! gatehouse HTTP server.
//!
//! Serves the admin login entry point and owns the directory client's
//! lifecycle: it connects at startup, optionally provisions the realm, and
//! disconnects on shutdown.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::{Router, routing::get};
use gatehouse_access::{LoginRedirector, NamedRoutes};
use gatehouse_directory::{Degrade, DirectoryClient, Provisioner};
use rootcause::prelude::Report;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::state::AppState;

/// Path of the admin login entry point.
pub const ADMIN_LOGIN_PATH: &str = "/admin/login/";

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(ADMIN_LOGIN_PATH, get(routes::admin_login))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the named route table from configuration.
#[must_use]
pub fn named_routes(config: &ServerConfig) -> NamedRoutes {
    let mut routes = NamedRoutes::new().with_route("admin_login", ADMIN_LOGIN_PATH);
    for (name, path) in &config.routes {
        routes.insert(name.clone(), path.clone());
    }
    routes
}

/// Connects the directory, runs provisioning if enabled, and assembles the
/// application state.
pub async fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let directory = DirectoryClient::connect(config.directory.clone()).await;

    if config.provision.enabled {
        provision(config, &directory).await;
    }

    let mut redirector = LoginRedirector::new(config.login.clone(), named_routes(config));
    if broker_registered(config, &directory).await {
        redirector = redirector.with_registered_broker(config.login.broker_id());
    } else {
        tracing::warn!(
            broker = %config.login.broker_id(),
            client_id = %config.directory.client_id(),
            "Application client not found in realm; admin login will be refused"
        );
    }

    Arc::new(
        AppState::new(redirector, directory, config.trust_forwarded_proto)
            .with_allowed_hosts(config.allowed_hosts.clone()),
    )
}

async fn provision(config: &ServerConfig, directory: &DirectoryClient) {
    if !directory.is_connected().await {
        tracing::warn!("Skipping provisioning; directory is not connected");
        return;
    }

    let plan = config.provision.plan(&config.directory);
    let report = Provisioner::new(directory).run(&plan).await;
    tracing::info!(
        created = report.created.len(),
        existing = report.existing.len(),
        failed = report.failed.len(),
        "Provisioning finished"
    );
}

async fn broker_registered(config: &ServerConfig, directory: &DirectoryClient) -> bool {
    if config.assume_broker_registered {
        return true;
    }
    directory
        .find_client(config.directory.client_id())
        .await
        .or_neutral("find_client")
        .is_some()
}

/// Runs the server until Ctrl-C, then releases the directory session.
pub async fn serve(config: ServerConfig) -> Result<(), Report<ServerError>> {
    let state = build_state(&config).await;
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: config.listen_addr.clone(),
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.listen_addr);

    let result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.directory.disconnect().await;

    result.map_err(|e| {
        ServerError::Serve {
            details: e.to_string(),
        }
        .into()
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use gatehouse_access::{LoginConfig, Principal};
    use gatehouse_directory::DirectoryConfig;
    use tower::ServiceExt;

    const LOGIN: &str = "/accounts/oidc/login/";

    fn state(broker_registered: bool, trust_forwarded_proto: bool) -> AppState {
        let routes = NamedRoutes::new().with_route("openid_connect_login", LOGIN);
        let mut redirector = LoginRedirector::new(LoginConfig::default(), routes);
        if broker_registered {
            redirector = redirector.with_registered_broker("keycloak");
        }
        let directory = DirectoryClient::disconnected(DirectoryConfig::default());
        AppState::new(redirector, directory, trust_forwarded_proto)
    }

    fn app(broker_registered: bool, trust_forwarded_proto: bool) -> Router {
        router(Arc::new(state(broker_registered, trust_forwarded_proto)))
    }

    fn request(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "app.example.com")
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn anonymous_without_next_goes_to_oidc_login() {
        let response = app(true, false)
            .oneshot(request("/admin/login/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            location(&response),
            "/accounts/oidc/login/?process=login&openid_connect=keycloak&next=%2Fadmin%2F"
        );
    }

    #[tokio::test]
    async fn foreign_next_is_replaced_with_admin_home() {
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=https%3A%2F%2Fevil.example%2Fphish")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = location(&response);
        assert!(location.starts_with(LOGIN));
        assert!(location.contains("process=login"));
        assert!(location.ends_with("next=%2Fadmin%2F"));
        assert!(!location.contains("evil"));
    }

    #[tokio::test]
    async fn repeated_next_uses_last_value() {
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=%2Fa%2F&next=https%3A%2F%2Fevil.example%2F")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = location(&response);
        assert!(location.ends_with("next=%2Fadmin%2F"));
        assert!(!location.contains("evil"));
    }

    #[tokio::test]
    async fn malformed_query_still_redirects() {
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=%2Fadmin%2Fusers%2F&&=x&next")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).ends_with("next=%2Fadmin%2F"));
    }

    #[tokio::test]
    async fn host_outside_allow_list_rejects_absolute_next() {
        let app = router(Arc::new(
            state(true, false).with_allowed_hosts(vec!["app.example.com".to_string()]),
        ));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/login/?next=http%3A%2F%2Fevil.example%2Fphish")
                    .header(header::HOST, "evil.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = location(&response);
        assert!(location.ends_with("next=%2Fadmin%2F"));
        assert!(!location.contains("evil"));
    }

    #[tokio::test]
    async fn allowed_host_keeps_absolute_next() {
        let app = router(Arc::new(
            state(true, false).with_allowed_hosts(vec!["app.example.com".to_string()]),
        ));
        let response = app
            .oneshot(
                request("/admin/login/?next=http%3A%2F%2Fapp.example.com%2Fadmin%2F")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(location(&response).ends_with("next=http%3A%2F%2Fapp.example.com%2Fadmin%2F"));
    }

    #[tokio::test]
    async fn same_host_next_is_kept() {
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=http%3A%2F%2Fapp.example.com%2Fadmin%2Fusers%2F")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            location(&response),
            "/accounts/oidc/login/?process=login&openid_connect=keycloak\
             &next=http%3A%2F%2Fapp.example.com%2Fadmin%2Fusers%2F"
        );
    }

    #[tokio::test]
    async fn trusted_forwarded_https_rejects_plain_http_next() {
        let response = app(true, true)
            .oneshot(
                request("/admin/login/?next=http%3A%2F%2Fapp.example.com%2Fadmin%2Fusers%2F")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(location(&response).ends_with("next=%2Fadmin%2F"));
    }

    #[tokio::test]
    async fn untrusted_forwarded_proto_is_ignored() {
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=http%3A%2F%2Fapp.example.com%2Fadmin%2F")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(location(&response).ends_with("next=http%3A%2F%2Fapp.example.com%2Fadmin%2F"));
    }

    #[tokio::test]
    async fn staff_goes_to_admin_home() {
        let staff = Principal::new("root@example.com", "root").with_staff(true);
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=%2Fadmin%2Fusers%2F")
                    .extension(staff)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/admin/");
    }

    #[tokio::test]
    async fn member_is_forbidden() {
        let member = Principal::new("bob@example.com", "bob");
        let response = app(true, false)
            .oneshot(
                request("/admin/login/?next=%2Fadmin%2F")
                    .extension(member)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert_eq!(
            body_text(response).await,
            "You do not have permission to access the admin site"
        );
    }

    #[tokio::test]
    async fn unregistered_broker_is_forbidden() {
        let response = app(false, false)
            .oneshot(request("/admin/login/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_text(response).await,
            "The OpenID Connect provider is not configured"
        );
    }

    #[test]
    fn named_routes_include_configured_entries() {
        use gatehouse_access::RouteResolver;

        let vars = std::iter::once((
            "ROUTES__OPENID_CONNECT_LOGIN".to_string(),
            LOGIN.to_string(),
        ))
        .collect();
        let config =
            ServerConfig::from_environment(::config::Environment::default().source(Some(vars)))
                .expect("config loads");

        let routes = named_routes(&config);
        assert_eq!(routes.resolve("openid_connect_login").expect("login"), LOGIN);
        assert_eq!(routes.resolve("admin_login").expect("self"), ADMIN_LOGIN_PATH);
    }
}
