//! Standalone Kickoff server.
//!
//! Configured through `KICKOFF_*` environment variables (see
//! [`ServerConfig::from_env`]) and `RUST_LOG`. Stops accepting new
//! connections on Ctrl-C.

use kickoff::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), KickoffError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(?config, "starting");

    let server = KickoffServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening for players");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
