mod config;
mod gateway;
mod wiring;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber_init();

    let config = config::Config::from_env().context("reading configuration")?;
    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        gateway = %config.gateway_url,
        "liquidation calculator listening"
    );

    axum::serve(listener, wiring::build_app(wiring::calculator(&config))).await?;
    Ok(())
}

fn tracing_subscriber_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
