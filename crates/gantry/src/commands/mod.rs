//! CLI command implementations.

pub mod build;
pub mod dev;
pub mod init;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gantry_adapters::BuildMode;
use gantry_pipeline::{BuildOptions, Config, Pipeline};

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: PathBuf,
    pub release: bool,
}

impl Settings {
    /// Directory the config file lives in; every configured path is
    /// relative to it.
    pub fn project_root(&self) -> Result<PathBuf> {
        let parent = self
            .config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        parent
            .canonicalize()
            .with_context(|| format!("Project directory not found: {}", parent.display()))
    }

    /// Load the config file and resolve it against the project root.
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(&self.config)?;
        Ok(config.rebased(&self.project_root()?))
    }

    /// Mode chosen at startup: `--release` wins over the config file.
    pub fn mode(&self, config: &Config) -> BuildMode {
        if self.release {
            BuildMode::Optimized
        } else {
            config.build.mode
        }
    }

    /// Assemble the pipeline for a build or dev run.
    pub fn pipeline(&self, validate_html: bool) -> Result<Pipeline> {
        let config = self.load_config()?;
        let options = BuildOptions {
            mode: self.mode(&config),
            validate_html,
        };
        Pipeline::new(config, options).context("Failed to set up build pipeline")
    }
}
