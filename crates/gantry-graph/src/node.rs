//! Composition nodes.

/// A unit of execution order: a task, a reference to a named target, or a
/// series/parallel grouping of other nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Run a single task (after its dependencies)
    Task(String),

    /// Run another named target
    Target(String),

    /// Run children one after another, aborting on the first failure
    Series(Vec<Node>),

    /// Run children together and join once all have finished
    Parallel(Vec<Node>),
}

impl Node {
    /// Leaf node for a task.
    pub fn task(name: impl Into<String>) -> Self {
        Node::Task(name.into())
    }

    /// Reference to a named target.
    pub fn target(name: impl Into<String>) -> Self {
        Node::Target(name.into())
    }

    /// Sequential composition.
    pub fn series(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Series(children.into_iter().collect())
    }

    /// Parallel composition.
    pub fn parallel(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Parallel(children.into_iter().collect())
    }

    /// Every task name referenced directly by this node (not through targets).
    pub fn task_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect(&mut names, &mut Vec::new());
        names
    }

    /// Every target name referenced by this node.
    pub fn target_names(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        self.collect(&mut Vec::new(), &mut targets);
        targets
    }

    fn collect<'a>(&'a self, tasks: &mut Vec<&'a str>, targets: &mut Vec<&'a str>) {
        match self {
            Node::Task(name) => tasks.push(name),
            Node::Target(name) => targets.push(name),
            Node::Series(children) | Node::Parallel(children) => {
                for child in children {
                    child.collect(tasks, targets);
                }
            }
        }
    }
}

impl From<&str> for Node {
    fn from(name: &str) -> Self {
        Node::task(name)
    }
}
