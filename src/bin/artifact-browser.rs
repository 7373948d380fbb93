//! Serves GitHub Actions artifacts over HTTP, configured from the environment.
//!
//! See: [`artifact_browser::env`]

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use artifact_browser::{
    config::Config,
    github::GithubClient,
    logging,
    server::{self, AppState},
    shutdown,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env();
    if config.auth_token.is_empty() {
        warn!("no GitHub token configured, API calls will be anonymous and heavily rate limited");
    }
    if config.repos.is_empty() {
        info!("serving artifacts from any repository");
    } else {
        let mut repos: Vec<_> = config.repos.iter().map(ToString::to_string).collect();
        repos.sort();
        info!("serving artifacts from {}", repos.join(", "));
    }

    let api = GithubClient::new(&config.api_host, &config.auth_token)
        .context("failed to create the GitHub client")?;
    let state = Arc::new(AppState::new(&config, Arc::new(api)));
    info!(
        "caching artifacts in {:?} for {:?} after their last access",
        state.cache().root(),
        config.artifact_validity
    );

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        "listening on {}{}/",
        listener.local_addr()?,
        config.context_path
    );

    #[cfg(unix)]
    shutdown::forward_terminate().context("failed to install the SIGTERM handler")?;

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown::signal())
        .await
        .context("server failure")?;

    info!("stopped");
    Ok(())
}
