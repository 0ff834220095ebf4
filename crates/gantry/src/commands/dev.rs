//! Development loop: build once, then watch and serve.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use gantry_server::{
    DevServer, DevServerConfig, FileWatcher, ReloadHub, WatchBinding, WatchController,
};

use super::Settings;

/// Run the dev command.
pub async fn run(settings: &Settings, prod: bool, port: Option<u16>, open: bool) -> Result<()> {
    let pipeline = settings.pipeline(prod)?;
    let server_config = pipeline.config().server.clone();
    let output = pipeline.output_dir().to_path_buf();

    // A broken initial build still leaves something to fix while watching.
    match pipeline.run_target("dev").await {
        Ok(result) => tracing::info!(
            "Initial build: {} files in {}ms",
            result.files,
            result.duration_ms
        ),
        Err(e) => tracing::error!("Initial build failed: {}", e),
    }

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut bindings: Vec<WatchBinding> = pipeline
        .watch_sources()
        .iter()
        .map(|w| WatchBinding::run(w.sources.clone(), w.task.clone()))
        .collect();
    bindings.push(WatchBinding::reload(&output)?);

    let hub = ReloadHub::new();
    let controller = Arc::new(WatchController::new(pipeline.graph(), bindings, hub.clone()));

    let (watcher, events) = FileWatcher::new(&controller.watch_roots())?;
    for root in watcher.roots() {
        tracing::info!("Watching {}", root.display());
    }

    let server = DevServer::new(
        DevServerConfig {
            root: output,
            port: port.unwrap_or(server_config.port),
            open: open && server_config.open,
            ..Default::default()
        },
        hub,
    )
    .bind()
    .await?;

    let watch_loop = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(events).await })
    };

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await?;

    tracing::info!("Shutting down");
    controller.shutdown();
    let _ = watch_loop.await;
    drop(watcher);

    Ok(())
}
