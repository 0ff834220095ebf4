//! One-shot build command.

use anyhow::{Context, Result};

use super::Settings;

/// Run the build command.
pub async fn run(settings: &Settings, prod: bool) -> Result<()> {
    let pipeline = settings.pipeline(prod)?;
    tracing::info!("Building ({})...", pipeline.mode().as_str());

    let result = pipeline.build().await.context("Build failed")?;

    tracing::info!(
        "Built {} files with {} tasks in {}ms",
        result.files,
        result.tasks.len(),
        result.duration_ms
    );
    if !result.warnings.is_empty() {
        tracing::warn!("{} warnings, see above", result.warnings.len());
    }
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
