//! Mail Feed: newsletters in, RSS out.
//!
//! Watches an IMAP inbox, turns each newsletter into an item of the feed
//! named by its recipient and serves the feeds over HTTP.

mod config;
mod http;
mod rate_limit;
mod service;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailfeed=info,mailfeed_core=info,mailfeed_imap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("TLS crypto provider was already installed");
    }

    info!("Starting Mail Feed");
    let config = Config::load()?;
    info!(
        server = %config.server,
        port = config.port,
        domain = config.domain.as_deref().unwrap_or("*"),
        "configuration loaded"
    );
    service::run(config).await
}
