//! Asset build pipeline for gantry.
//!
//! Loads `gantry.toml`, wires one task per asset class into a validated task
//! graph, and exposes the `build` and `dev` targets.

pub mod builder;
pub mod config;
pub mod tasks;

pub use builder::{BuildOptions, BuildResult, Pipeline, PipelineError, WatchSource};
pub use config::{Config, ConfigError};
pub use tasks::{AdapterTask, CleanTask};
