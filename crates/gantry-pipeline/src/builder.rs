//! The asset task graph and its `build` and `dev` targets.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use gantry_adapters::{
    AdapterError, BuildMode, CopyAdapter, ImagesAdapter, ScriptsAdapter, SourceSet, StylesAdapter,
    TemplateValidation, TemplatesAdapter,
};
use gantry_graph::{GraphError, Node, RunError, RunSummary, Task, TaskContext, TaskGraph};

use crate::config::Config;
use crate::tasks::{AdapterTask, CleanTask};

/// Asset tasks in the order they are declared in the `build` target.
pub const ASSET_TASKS: &[&str] = &["styles", "scripts", "images", "templates", "fonts", "favicon"];

/// Startup options that are not part of the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: BuildMode,

    /// Run structural HTML validation on rendered pages
    pub validate_html: bool,
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Tasks that finished, in completion order
    pub tasks: Vec<String>,

    /// Number of files written (or removed by clean)
    pub files: usize,

    /// Non-fatal diagnostics from every task
    pub warnings: Vec<String>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    fn from_summary(summary: RunSummary, start: Instant, output_dir: &Path) -> Self {
        Self {
            tasks: summary.completed().into_iter().map(String::from).collect(),
            files: summary.files(),
            warnings: summary.warnings().map(String::from).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: output_dir.to_path_buf(),
        }
    }
}

/// Errors that can occur while assembling or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] AdapterError),

    #[error("Invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// A task's inputs, for the watch controller.
#[derive(Debug, Clone)]
pub struct WatchSource {
    pub task: String,
    pub sources: SourceSet,
}

/// The configured asset pipeline.
pub struct Pipeline {
    config: Config,
    options: BuildOptions,
    graph: Arc<TaskGraph>,
    watch: Vec<WatchSource>,
}

impl Pipeline {
    /// Assemble the task graph from configuration.
    pub fn new(config: Config, options: BuildOptions) -> Result<Self, PipelineError> {
        let mode = options.mode;

        let styles = SourceSet::new(&config.styles.input)?;
        let scripts = SourceSet::new(&config.scripts.entry)?;
        let images = SourceSet::new(&config.images.input)?;
        let templates = SourceSet::new(&config.templates.input)?;
        let fonts = SourceSet::new(&config.fonts.input)?;
        let favicon = SourceSet::new(&config.favicon.input)?;

        let mut styles_adapter = StylesAdapter::new(mode, config.styles.targets.clone());
        if let Some(grid) = &config.grid {
            styles_adapter = styles_adapter.with_grid(grid.clone(), styles.root());
        }

        let validation = TemplateValidation {
            html: options.validate_html,
            strict: config.templates.strict,
        };

        let tasks = vec![
            AdapterTask::new("styles", styles_adapter, styles, &config.styles.output),
            AdapterTask::new(
                "scripts",
                ScriptsAdapter::new(mode, config.scripts.bundler.clone()),
                scripts,
                &config.scripts.output,
            ),
            AdapterTask::new(
                "images",
                ImagesAdapter::new(mode, config.images.jpeg_quality),
                images,
                &config.images.output,
            ),
            AdapterTask::new(
                "templates",
                TemplatesAdapter::new(mode, templates.root(), validation),
                templates,
                &config.templates.output,
            ),
            AdapterTask::new("fonts", CopyAdapter::new("fonts"), fonts, &config.fonts.output),
            AdapterTask::new(
                "favicon",
                CopyAdapter::new("favicon"),
                favicon,
                &config.favicon.output,
            ),
        ];

        let watch = tasks
            .iter()
            .map(|task| WatchSource {
                task: task.name().to_string(),
                sources: task.sources().clone(),
            })
            .collect();

        let mut builder = TaskGraph::builder().task(CleanTask::new(&config.build.output));
        for task in tasks {
            builder = builder.task(task);
        }

        let graph = builder
            .target(
                "build",
                Node::series([
                    Node::task("clean"),
                    Node::parallel(ASSET_TASKS.iter().map(|name| Node::task(*name))),
                ]),
            )
            .target("dev", Node::series([Node::target("build")]))
            .build()?;

        tracing::debug!("Pipeline ready in {} mode: {:?}", mode.as_str(), graph);

        Ok(Self {
            config,
            options,
            graph: Arc::new(graph),
            watch,
        })
    }

    /// The validated task graph.
    pub fn graph(&self) -> Arc<TaskGraph> {
        Arc::clone(&self.graph)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> BuildMode {
        self.options.mode
    }

    /// Output root: what `clean` empties and the dev server serves.
    pub fn output_dir(&self) -> &Path {
        &self.config.build.output
    }

    /// Every asset task with the files it reads.
    pub fn watch_sources(&self) -> &[WatchSource] {
        &self.watch
    }

    /// Run the `build` target once.
    pub async fn build(&self) -> Result<BuildResult, PipelineError> {
        self.run_target("build").await
    }

    /// Run a named target to completion.
    pub async fn run_target(&self, name: &str) -> Result<BuildResult, PipelineError> {
        tracing::info!("Running '{}' ({})", name, self.options.mode.as_str());
        let start = Instant::now();

        let summary = self.graph.run_target(name, &TaskContext::new()).await?;
        let result = BuildResult::from_summary(summary, start, self.output_dir());

        tracing::info!(
            "Ran {} tasks, {} files in {}ms",
            result.tasks.len(),
            result.files,
            result.duration_ms
        );
        if !result.warnings.is_empty() {
            tracing::warn!("{} warnings", result.warnings.len());
        }

        Ok(result)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("output", &self.config.build.output)
            .field("graph", &self.graph)
            .finish()
    }
}
