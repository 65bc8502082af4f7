use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_server::{
    app,
    catalog::CdnClient,
    github::GitHubClient,
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Marketplace Server...");

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "Environment: {}, Server: {}",
        config.environment,
        config.server_address()
    );
    tracing::info!(
        "Uploads open PRs against {} ({}), cooldown {}s",
        config.upload_repo,
        config.base_branch,
        config.upload_cooldown_secs
    );

    // GitHub rejects API requests without a User-Agent
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;

    let github = Arc::new(GitHubClient::new(http.clone(), &config));
    let cdn = Arc::new(CdnClient::new(
        http.clone(),
        config.cdn_base_url.clone(),
        config.base_branch.clone(),
    ));

    let addr: SocketAddr = config.server_address().parse()?;
    let state = AppState::new(config, github, cdn, http);

    // Start server
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
