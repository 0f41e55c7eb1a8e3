//! Serve command - hosts the coordinator HTTP API

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use airship_coordinator::{api, CoordinatorConfig};

use crate::commander::build_coordinator;

pub async fn execute(config_path: &str) -> Result<()> {
    let config = CoordinatorConfig::from_file(config_path)
        .with_context(|| format!("failed to load coordinator config {config_path}"))?;

    let coordinator = build_coordinator(&config).await?;

    // prime the directory before accepting requests
    coordinator.update_all_coordinators().await?;
    coordinator.update_all_agents().await?;
    coordinator.start(Duration::from_secs(config.status_expiration_secs));

    let router = api::router(coordinator);

    let listener = tokio::net::TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind))?;
    info!(
        "coordinator for environment '{}' listening on http://{}",
        config.environment, config.http_bind
    );
    axum::serve(listener, router)
        .await
        .context("coordinator server failed")?;
    Ok(())
}
