use anyhow::Context;
use tracing::{info, warn};

use jobboard_api::{AppConfig, build_app};
use jobboard_auth::PolicyTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    jobboard_observability::init(config.log_format);

    if config.jwt_secret == AppConfig::default().jwt_secret {
        warn!("JWT_SECRET not set; using insecure dev default");
    }

    match &config.policy_path {
        Some(path) => {
            let table = PolicyTable::from_path(path).context("failed to load policy")?;
            jobboard_auth::policy::install(table).context("failed to install policy")?;
            info!(path = %path.display(), "policy loaded");
        }
        None => info!("using built-in policy"),
    }

    let app = build_app(&config).context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let stats = app.workers.shutdown().await;
    info!(
        processed = stats.processed,
        delivered = stats.delivered,
        failed_terminal = stats.failed_terminal,
        "delivery workers stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
}
