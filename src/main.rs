use anyhow::{Error, Result};
use event_notifier::{api::run_api_server, config::Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    info!(
        project_id = %config.gcp_project_id,
        delivery = ?config.message_delivery,
        "Configuration validated"
    );

    run_api_server(config).await
}
