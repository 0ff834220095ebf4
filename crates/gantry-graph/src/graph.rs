//! Validated task graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::node::Node;
use crate::task::Task;

/// Errors detected while building a graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("Unknown task `{name}` referenced by {referrer}")]
    UnknownTask { name: String, referrer: String },

    #[error("Unknown target `{name}` referenced by {referrer}")]
    UnknownTarget { name: String, referrer: String },

    #[error("Cycle detected involving {0}")]
    Cycle(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Vertex {
    Task(String),
    Target(String),
}

impl Vertex {
    fn describe(&self) -> String {
        match self {
            Vertex::Task(name) => format!("task `{}`", name),
            Vertex::Target(name) => format!("target `{}`", name),
        }
    }
}

/// Collects tasks and targets before validation.
#[derive(Default)]
pub struct TaskGraphBuilder {
    tasks: Vec<Arc<dyn Task>>,
    targets: Vec<(String, Node)>,
}

impl TaskGraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    pub fn task<T: Task + 'static>(self, task: T) -> Self {
        self.shared_task(Arc::new(task))
    }

    /// Register an already shared task.
    pub fn shared_task(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Register a named composition.
    pub fn target(mut self, name: impl Into<String>, node: Node) -> Self {
        self.targets.push((name.into(), node));
        self
    }

    /// Validate references and acyclicity and freeze the graph.
    pub fn build(self) -> Result<TaskGraph, GraphError> {
        let mut tasks: HashMap<String, Arc<dyn Task>> = HashMap::new();
        for task in self.tasks {
            let name = task.name().to_string();
            if tasks.insert(name.clone(), task).is_some() {
                return Err(GraphError::DuplicateTask(name));
            }
        }

        let mut targets: HashMap<String, Node> = HashMap::new();
        for (name, node) in self.targets {
            if targets.insert(name.clone(), node).is_some() {
                return Err(GraphError::DuplicateTarget(name));
            }
        }

        let mut graph: DiGraph<Vertex, ()> = DiGraph::new();
        let mut index: HashMap<Vertex, NodeIndex> = HashMap::new();
        for name in tasks.keys() {
            let v = Vertex::Task(name.clone());
            index.insert(v.clone(), graph.add_node(v));
        }
        for name in targets.keys() {
            let v = Vertex::Target(name.clone());
            index.insert(v.clone(), graph.add_node(v));
        }

        // Edges point from prerequisite to dependent.
        for (name, task) in &tasks {
            let me = index[&Vertex::Task(name.clone())];
            for dep in task.dependencies() {
                let Some(&from) = index.get(&Vertex::Task(dep.clone())) else {
                    return Err(GraphError::UnknownTask {
                        name: dep.clone(),
                        referrer: format!("task `{}`", name),
                    });
                };
                graph.add_edge(from, me, ());
            }
        }

        for (name, node) in &targets {
            let me = index[&Vertex::Target(name.clone())];
            for task in node.task_names() {
                let Some(&from) = index.get(&Vertex::Task(task.to_string())) else {
                    return Err(GraphError::UnknownTask {
                        name: task.to_string(),
                        referrer: format!("target `{}`", name),
                    });
                };
                graph.add_edge(from, me, ());
            }
            for target in node.target_names() {
                let Some(&from) = index.get(&Vertex::Target(target.to_string())) else {
                    return Err(GraphError::UnknownTarget {
                        name: target.to_string(),
                        referrer: format!("target `{}`", name),
                    });
                };
                graph.add_edge(from, me, ());
            }
        }

        let sorted = toposort(&graph, None)
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].describe()))?;

        let mut order = HashMap::new();
        for (position, ix) in sorted.into_iter().enumerate() {
            if let Vertex::Task(name) = &graph[ix] {
                order.insert(name.clone(), position);
            }
        }

        Ok(TaskGraph {
            tasks,
            targets,
            order,
        })
    }
}

/// An immutable, acyclic set of tasks and named targets.
pub struct TaskGraph {
    pub(crate) tasks: HashMap<String, Arc<dyn Task>>,
    pub(crate) targets: HashMap<String, Node>,
    order: HashMap<String, usize>,
}

impl TaskGraph {
    /// Start building a graph.
    pub fn builder() -> TaskGraphBuilder {
        TaskGraphBuilder::new()
    }

    /// Look up a task.
    pub fn task(&self, name: &str) -> Option<&Arc<dyn Task>> {
        self.tasks.get(name)
    }

    /// Look up a target's composition.
    pub fn target(&self, name: &str) -> Option<&Node> {
        self.targets.get(name)
    }

    /// Sorted task names.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The task and everything it depends on, prerequisites first.
    ///
    /// Returns `None` for an unknown task.
    pub fn execution_plan(&self, name: &str) -> Option<Vec<String>> {
        if !self.tasks.contains_key(name) {
            return None;
        }

        let mut seen = HashSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(task) = self.tasks.get(&current) {
                stack.extend(task.dependencies().iter().cloned());
            }
        }

        let mut plan: Vec<String> = seen.into_iter().collect();
        plan.sort_by_key(|task| self.order.get(task).copied().unwrap_or(usize::MAX));
        Some(plan)
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_names())
            .field("targets", &self.targets)
            .finish()
    }
}
