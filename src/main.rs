use std::net::SocketAddr;
use std::time::Duration;

use log::{info, warn};
use rustls::crypto::{CryptoProvider, ring};
use tokio::net::TcpListener;
use tokio::time::sleep;

use hcs_character_collector::{
    config::Config,
    feed::build_feed,
    metrics::METRICS,
    server::{self, AppState},
};

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging and the rustls crypto backend
// - Load configuration (environment, optionally seeded from .env)
// - Build the shared mirror feed client once
// - Serve the HTTP endpoint
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the variables.
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // --------------------------------------------------------
    // rustls >= 0.23 requires an explicit CryptoProvider.
    // Must run before any TLS client is built.
    // --------------------------------------------------------
    if CryptoProvider::install_default(ring::default_provider()).is_err() {
        warn!("rustls CryptoProvider was already installed");
    }

    let config = Config::from_env()?;

    info!(
        "Operator {} on {} (mirror {})",
        config.operator.account_id, config.mirror.network, config.mirror.base_url
    );

    let feed = build_feed(&config.mirror)?;

    // --------------------------------------------------------
    // Metrics reporter (periodic, low-noise)
    // --------------------------------------------------------
    if config.metrics_interval_secs > 0 {
        let every = Duration::from_secs(config.metrics_interval_secs);
        tokio::spawn(async move {
            loop {
                sleep(every).await;
                info!("[METRICS] {}", METRICS.summary());
            }
        });
    }

    let state = AppState {
        feed,
        topic_id: config.collector.topic_id,
        collect_timeout: config.collector.timeout,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    server::serve(listener, state).await
}
