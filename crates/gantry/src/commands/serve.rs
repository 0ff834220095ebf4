//! Preview server command.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::Router;
use tower_http::services::ServeDir;

use super::Settings;

/// Run the serve command.
pub async fn run(
    settings: &Settings,
    port: Option<u16>,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let config = settings.load_config()?;
    let dir = dir.unwrap_or_else(|| config.build.output.clone());

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'gantry build' first.",
            dir.display()
        );
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(config.server.port)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let url = format!("http://{}", listener.local_addr()?);

    tracing::info!("Serving {} at {}", dir.display(), url);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    if open && config.server.open {
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    axum::serve(listener, app).await?;

    Ok(())
}
