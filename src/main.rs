// src/main.rs
//! Local Overrides Engine
//!
//! Opens the configured overrides directory, computes the interception
//! patterns it implies and prints the encoded local path of every URL given
//! on the command line. Runs until Ctrl-C.

use anyhow::{Context, Result};
use overrides_engine::interception::LoggingTransport;
use overrides_engine::observability::{init_metrics, init_tracing};
use overrides_engine::utils::config::EngineConfig;
use overrides_engine::workspace::{FileSystemProject, ProjectId, Workspace};
use overrides_engine::{OverridesEngine, Settings, VERSION};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = EngineConfig::load().context("Failed to load configuration")?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.logging)?;
    let metrics = init_metrics()?;

    info!("Starting Local Overrides Engine v{}", VERSION);
    debug!("Configuration loaded: {:?}", config);

    let workspace = Arc::new(Workspace::new());
    let settings = Arc::new(Settings::from_config(&config.overrides));
    let transport = Arc::new(LoggingTransport::new());

    let engine = OverridesEngine::new(
        Arc::clone(&workspace),
        settings,
        transport,
        &config.overrides,
    );
    engine.attach().await;

    match &config.overrides.project_dir {
        Some(dir) => {
            let project = FileSystemProject::open(
                ProjectId::new("overrides"),
                dir,
                workspace.event_sender(),
            )
            .await
            .with_context(|| format!("Failed to open overrides directory {:?}", dir))?;

            let project = Arc::new(project);
            workspace.add_project(project.clone());
            engine.project_added(project).await;
        }
        None => warn!("No overrides.project_dir configured, nothing will be intercepted"),
    }

    // The CLI session counts as the connected target
    engine.target_added().await;

    let patterns = engine.force_update().await?;
    for pattern in &patterns {
        println!("{}", pattern.url_pattern);
    }

    for url in std::env::args().skip(1) {
        println!("{} -> {}", url, engine.encoded_path_from_url(&url));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;
    info!("Received shutdown signal, cleaning up...");

    engine.detach();
    debug!("Final metrics:\n{}", metrics.render());
    Ok(())
}
