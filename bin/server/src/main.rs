use gatehouse_server::{config::ServerConfig, error::ServerError};
use rootcause::prelude::Report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Report<ServerError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(ServerError::from)?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        directory = %config.directory.server_url(),
        realm = %config.directory.realm(),
        "Loaded configuration"
    );

    gatehouse_server::serve(config).await
}
