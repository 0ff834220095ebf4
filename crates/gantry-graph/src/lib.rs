//! Task graph for gantry builds.
//!
//! Tasks are named async units of work. Targets compose them into series and
//! parallel groups. The graph is validated once (unique names, known
//! references, no cycles) and is immutable afterwards.

pub mod graph;
pub mod node;
pub mod runner;
pub mod task;

pub use graph::{GraphError, TaskGraph, TaskGraphBuilder};
pub use node::Node;
pub use runner::{RunError, RunSummary, TaskRecord};
pub use task::{BoxError, FnTask, Task, TaskContext, TaskError, TaskFuture, TaskReport};
pub use tokio_util::sync::CancellationToken;
