//! chatgate: abuse-gated relay between the site chat widget and the model provider.
//! Used by: binary entrypoint.

pub mod classifier;
pub mod client_ip;
pub mod completion;
pub mod config;
pub mod console;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod ratelimit;
pub mod reference;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod transcript;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::reference::ReferenceRefresher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");
    let state = state::build_state(&config)?;

    let shutdown = CancellationToken::new();
    let refresher = ReferenceRefresher::new(
        config.reference_url.clone(),
        config.reference_refresh,
        state.reference.clone(),
    )?
    .spawn(shutdown.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown requested");
        signal.cancel();
    });

    console::print_banner();
    console::print_startup(&config.bind_addr, &config.reference_url);
    tracing::info!("starting chatgate on {}", config.bind_addr);

    let served = server::run(state, &config.bind_addr, shutdown.clone()).await;
    shutdown.cancel();
    refresher.await?;
    served?;
    Ok(())
}
