//! Execution of composition nodes.

use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use crate::graph::TaskGraph;
use crate::node::Node;
use crate::task::{TaskContext, TaskError, TaskReport};

/// Errors from running a node.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },

    #[error("{} tasks failed: {}", .0.len(), summarize(.0))]
    Parallel(Vec<RunError>),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),
}

impl RunError {
    /// Names of the tasks that failed, in report order.
    pub fn failed_tasks(&self) -> Vec<&str> {
        match self {
            RunError::Task { task, .. } => vec![task.as_str()],
            RunError::Parallel(errors) => errors.iter().flat_map(RunError::failed_tasks).collect(),
            RunError::UnknownTask(_) | RunError::UnknownTarget(_) => vec![],
        }
    }
}

fn summarize(errors: &[RunError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One finished task.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: String,
    pub duration: Duration,
    pub report: TaskReport,
}

/// Finished tasks in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub records: Vec<TaskRecord>,
}

impl RunSummary {
    /// Names of finished tasks in completion order.
    pub fn completed(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Total files reported by all tasks.
    pub fn files(&self) -> usize {
        self.records.iter().map(|r| r.report.files.len()).sum()
    }

    /// All warnings reported by all tasks.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .flat_map(|r| r.report.warnings.iter().map(String::as_str))
    }

    fn extend(&mut self, other: RunSummary) {
        self.records.extend(other.records);
    }
}

impl TaskGraph {
    /// Run a named target.
    pub async fn run_target(&self, name: &str, ctx: &TaskContext) -> Result<RunSummary, RunError> {
        self.run(&Node::target(name), ctx).await
    }

    /// Run a single task after its dependency closure.
    pub async fn run_task(&self, name: &str, ctx: &TaskContext) -> Result<RunSummary, RunError> {
        self.run(&Node::task(name), ctx).await
    }

    /// Run a composition node.
    ///
    /// Series children run in order and the first failure aborts the rest.
    /// Parallel children all start together; the group waits for every child
    /// before reporting, even when one fails.
    pub fn run<'a>(
        &'a self,
        node: &'a Node,
        ctx: &'a TaskContext,
    ) -> BoxFuture<'a, Result<RunSummary, RunError>> {
        async move {
            match node {
                Node::Task(name) => self.run_plan(name, ctx).await,
                Node::Target(name) => {
                    let target = self
                        .targets
                        .get(name)
                        .ok_or_else(|| RunError::UnknownTarget(name.clone()))?;
                    self.run(target, ctx).await
                }
                Node::Series(children) => {
                    let mut summary = RunSummary::default();
                    for child in children {
                        summary.extend(self.run(child, ctx).await?);
                    }
                    Ok(summary)
                }
                Node::Parallel(children) => {
                    let results = join_all(children.iter().map(|child| self.run(child, ctx))).await;

                    let mut summary = RunSummary::default();
                    let mut errors = Vec::new();
                    for result in results {
                        match result {
                            Ok(s) => summary.extend(s),
                            Err(e) => errors.push(e),
                        }
                    }

                    match errors.len() {
                        0 => Ok(summary),
                        1 => Err(errors.remove(0)),
                        _ => Err(RunError::Parallel(errors)),
                    }
                }
            }
        }
        .boxed()
    }

    async fn run_plan(&self, name: &str, ctx: &TaskContext) -> Result<RunSummary, RunError> {
        let plan = self
            .execution_plan(name)
            .ok_or_else(|| RunError::UnknownTask(name.to_string()))?;

        let mut summary = RunSummary::default();
        for step in plan {
            summary.records.push(self.run_one(&step, ctx).await?);
        }
        Ok(summary)
    }

    async fn run_one(&self, name: &str, ctx: &TaskContext) -> Result<TaskRecord, RunError> {
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| RunError::UnknownTask(name.to_string()))?;

        if ctx.is_cancelled() {
            tracing::debug!("Skipping '{}': cancelled", name);
            return Err(RunError::Task {
                task: name.to_string(),
                source: TaskError::Cancelled,
            });
        }

        tracing::info!("Starting '{}'...", name);
        let start = Instant::now();

        match task.run(ctx).await {
            Ok(report) => {
                let duration = start.elapsed();
                for warning in &report.warnings {
                    tracing::warn!("[{}] {}", name, warning);
                }
                tracing::info!("Finished '{}' after {}ms", name, duration.as_millis());
                Ok(TaskRecord {
                    name: name.to_string(),
                    duration,
                    report,
                })
            }
            Err(source) => {
                tracing::error!(
                    "'{}' errored after {}ms: {}",
                    name,
                    start.elapsed().as_millis(),
                    source
                );
                Err(RunError::Task {
                    task: name.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{FnTask, TaskFuture};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logged(
        name: &'static str,
        log: &Log,
        delay_ms: u64,
        fail: bool,
    ) -> FnTask<impl Fn(TaskContext) -> TaskFuture<'static> + Send + Sync> {
        let log = Arc::clone(log);
        FnTask::new(name, move |_ctx| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("start:{}", name));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                log.lock().unwrap().push(format!("end:{}", name));
                if fail {
                    Err(TaskError::failed(format!("{} exploded", name)))
                } else {
                    Ok(TaskReport::new())
                }
            }
            .boxed()
        })
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("missing {} in {:?}", entry, log))
    }

    #[tokio::test]
    async fn series_runs_in_declared_order() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("a", &log, 10, false))
            .task(logged("b", &log, 0, false))
            .target("all", Node::series([Node::task("a"), Node::task("b")]))
            .build()
            .unwrap();

        let summary = graph.run_target("all", &TaskContext::new()).await.unwrap();

        assert_eq!(summary.completed(), vec!["a", "b"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start:a", "end:a", "start:b", "end:b"]
        );
    }

    #[tokio::test]
    async fn series_aborts_on_first_failure() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("broken", &log, 0, true))
            .task(logged("never", &log, 0, false))
            .target("all", Node::series([Node::task("broken"), Node::task("never")]))
            .build()
            .unwrap();

        let err = graph.run_target("all", &TaskContext::new()).await.unwrap_err();

        assert_eq!(err.failed_tasks(), vec!["broken"]);
        assert!(!log.lock().unwrap().iter().any(|e| e.contains("never")));
    }

    #[tokio::test]
    async fn parallel_join_waits_for_slowest_sibling() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("slow", &log, 50, false))
            .task(logged("fast", &log, 0, false))
            .task(logged("after", &log, 0, false))
            .target(
                "all",
                Node::series([
                    Node::parallel([Node::task("slow"), Node::task("fast")]),
                    Node::task("after"),
                ]),
            )
            .build()
            .unwrap();

        graph.run_target("all", &TaskContext::new()).await.unwrap();

        let log = log.lock().unwrap();
        // Both siblings start before either finishes.
        assert!(position(&log, "start:fast") < position(&log, "end:slow"));
        assert!(position(&log, "end:slow") < position(&log, "start:after"));
        assert!(position(&log, "end:fast") < position(&log, "start:after"));
    }

    #[tokio::test]
    async fn parallel_failure_waits_for_siblings() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("broken", &log, 0, true))
            .task(logged("slow", &log, 30, false))
            .target(
                "all",
                Node::parallel([Node::task("broken"), Node::task("slow")]),
            )
            .build()
            .unwrap();

        let err = graph.run_target("all", &TaskContext::new()).await.unwrap_err();

        assert_eq!(err.failed_tasks(), vec!["broken"]);
        assert!(log.lock().unwrap().contains(&"end:slow".to_string()));
    }

    #[tokio::test]
    async fn parallel_reports_every_failure() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("x", &log, 0, true))
            .task(logged("y", &log, 5, true))
            .target("all", Node::parallel([Node::task("x"), Node::task("y")]))
            .build()
            .unwrap();

        let err = graph.run_target("all", &TaskContext::new()).await.unwrap_err();

        assert!(matches!(err, RunError::Parallel(ref errs) if errs.len() == 2));
        assert_eq!(err.failed_tasks(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn task_runs_dependencies_first() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("base", &log, 0, false))
            .task(logged("top", &log, 0, false).depends_on(["base"]))
            .build()
            .unwrap();

        let summary = graph.run_task("top", &TaskContext::new()).await.unwrap();

        assert_eq!(summary.completed(), vec!["base", "top"]);
    }

    #[tokio::test]
    async fn nested_targets_run() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("a", &log, 0, false))
            .target("build", Node::task("a"))
            .target("dev", Node::series([Node::target("build")]))
            .build()
            .unwrap();

        let summary = graph.run_target("dev", &TaskContext::new()).await.unwrap();
        assert_eq!(summary.completed(), vec!["a"]);
    }

    #[tokio::test]
    async fn cancelled_context_skips_tasks() {
        let log = Log::default();
        let graph = TaskGraph::builder()
            .task(logged("a", &log, 0, false))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = graph
            .run_task("a", &TaskContext::with_token(token))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Task {
                source: TaskError::Cancelled,
                ..
            }
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_names_are_errors() {
        let graph = TaskGraph::builder().build().unwrap();
        let ctx = TaskContext::new();

        assert!(matches!(
            graph.run_task("nope", &ctx).await,
            Err(RunError::UnknownTask(_))
        ));
        assert!(matches!(
            graph.run_target("nope", &ctx).await,
            Err(RunError::UnknownTarget(_))
        ));
    }
}
