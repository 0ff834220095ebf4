//! Task trait and the context tasks run in.

use std::path::PathBuf;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Boxed error type returned by task actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Future returned by [`Task::run`].
pub type TaskFuture<'a> = BoxFuture<'a, Result<TaskReport, TaskError>>;

/// Context handed to every task invocation.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    cancel: CancellationToken,
}

impl TaskContext {
    /// Create a context that is never cancelled unless asked to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Token for this invocation.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the invocation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// What a task produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Files written (or removed, for clean) by the task
    pub files: Vec<PathBuf>,

    /// Non-fatal diagnostics
    pub warnings: Vec<String>,
}

impl TaskReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Errors a task can finish with.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Failed(BoxError),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap any error as a task failure.
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(err.into())
    }
}

/// A named, idempotent unit of build work.
pub trait Task: Send + Sync {
    /// Unique task name (e.g. "styles").
    fn name(&self) -> &str;

    /// Names of tasks that must complete before this one starts.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Execute the task once.
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a>;
}

/// Task backed by a closure returning a future.
pub struct FnTask<F> {
    name: String,
    dependencies: Vec<String>,
    action: F,
}

impl<F> FnTask<F>
where
    F: Fn(TaskContext) -> BoxFuture<'static, Result<TaskReport, TaskError>> + Send + Sync,
{
    /// Create a task from a name and an action.
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            action,
        }
    }

    /// Declare tasks that must run first.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(TaskContext) -> BoxFuture<'static, Result<TaskReport, TaskError>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        (self.action)(ctx.clone())
    }
}
