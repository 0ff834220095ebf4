//! Graph tasks that drive transform adapters.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use gantry_adapters::{clean_dir, AdapterError, SourceSet, TransformAdapter, TransformReport};
use gantry_graph::{Task, TaskContext, TaskError, TaskFuture, TaskReport};

/// Runs one adapter over one source set into one destination.
pub struct AdapterTask {
    name: String,
    adapter: Arc<dyn TransformAdapter>,
    sources: SourceSet,
    dest: PathBuf,
}

impl AdapterTask {
    pub fn new(
        name: impl Into<String>,
        adapter: impl TransformAdapter + 'static,
        sources: SourceSet,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            adapter: Arc::new(adapter),
            sources,
            dest: dest.into(),
        }
    }

    /// Files this task reads.
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Directory this task writes into.
    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

impl Task for AdapterTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let adapter = Arc::clone(&self.adapter);
        let sources = self.sources.clone();
        let dest = self.dest.clone();

        async move {
            let work = tokio::task::spawn_blocking(
                move || -> Result<TransformReport, AdapterError> {
                    let inputs = sources.resolve()?;
                    if inputs.is_empty() {
                        tracing::debug!("[{}] no files match {}", adapter.name(), sources.glob());
                    }
                    adapter.transform(&inputs, &dest)
                },
            );

            let report = tokio::select! {
                biased;
                _ = ctx.token().cancelled() => return Err(TaskError::Cancelled),
                joined = work => joined
                    .map_err(|e| TaskError::Panicked(e.to_string()))?
                    .map_err(TaskError::failed)?,
            };

            Ok(TaskReport {
                files: report.written,
                warnings: report.warnings,
            })
        }
        .boxed()
    }
}

/// Empties the output root.
pub struct CleanTask {
    root: PathBuf,
}

impl CleanTask {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Task for CleanTask {
    fn name(&self) -> &str {
        "clean"
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> TaskFuture<'a> {
        let root = self.root.clone();

        async move {
            let removed = tokio::task::spawn_blocking(move || clean_dir(&root))
                .await
                .map_err(|e| TaskError::Panicked(e.to_string()))?
                .map_err(TaskError::failed)?;

            Ok(TaskReport {
                files: removed,
                warnings: Vec::new(),
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_adapters::CopyAdapter;
    use gantry_graph::CancellationToken;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn adapter_task_resolves_and_writes() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("fonts");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.woff2"), "font").unwrap();
        let out = temp.path().join("build/fonts");

        let task = AdapterTask::new(
            "fonts",
            CopyAdapter::new("fonts"),
            SourceSet::new(format!("{}/**/*", src.display())).unwrap(),
            &out,
        );

        let report = task.run(&TaskContext::new()).await.unwrap();
        assert_eq!(report.files, vec![out.join("a.woff2")]);
    }

    #[tokio::test]
    async fn adapter_errors_fail_the_task() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("js");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("scripts.js"), "function (").unwrap();

        let task = AdapterTask::new(
            "scripts",
            gantry_adapters::ScriptsAdapter::new(Default::default(), None),
            SourceSet::new(src.join("scripts.js").to_string_lossy()).unwrap(),
            temp.path().join("out"),
        );

        let err = task.run(&TaskContext::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::Failed(_)));
    }

    #[tokio::test]
    async fn cancelled_context_stops_waiting() {
        let temp = tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let task = AdapterTask::new(
            "fonts",
            CopyAdapter::new("fonts"),
            SourceSet::new(format!("{}/**/*", temp.path().display())).unwrap(),
            temp.path().join("out"),
        );

        let result = task.run(&TaskContext::with_token(token)).await;
        assert!(matches!(result, Err(TaskError::Cancelled)));
    }

    #[tokio::test]
    async fn clean_task_empties_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("build");
        fs::create_dir_all(root.join("static")).unwrap();
        fs::write(root.join("index.html"), "x").unwrap();

        let report = CleanTask::new(&root).run(&TaskContext::new()).await.unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(root.exists());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }
}
