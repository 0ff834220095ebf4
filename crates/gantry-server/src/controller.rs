//! Maps filesystem changes to task runs and reload messages.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use gantry_adapters::{AdapterError, SourceSet};
use gantry_graph::{CancellationToken, TaskContext, TaskGraph};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::livereload::{AssetKind, ChangedAsset, ReloadHub, ReloadMessage};
use crate::watcher::ChangeBatch;

/// What a change under a binding triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Re-run the named task
    Run(String),

    /// Notify browsers; the changed paths are URLs below the binding root
    Reload,
}

/// A glob paired with the action a change to it triggers.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    sources: SourceSet,
    action: WatchAction,
}

impl WatchBinding {
    /// Re-run `task` when a file in `sources` changes.
    pub fn run(sources: SourceSet, task: impl Into<String>) -> Self {
        Self {
            sources,
            action: WatchAction::Run(task.into()),
        }
    }

    /// Notify browsers when anything under the output root changes.
    pub fn reload(output_root: &Path) -> Result<Self, AdapterError> {
        let glob = output_root.join("**").join("*");
        Ok(Self {
            sources: SourceSet::new(glob.to_string_lossy())?,
            action: WatchAction::Reload,
        })
    }

    pub fn action(&self) -> &WatchAction {
        &self.action
    }

    /// Directory to hand to the file watcher.
    pub fn watch_root(&self) -> PathBuf {
        self.sources.watch_root()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.sources.matches(path)
    }

    /// URL path of a changed output file, e.g. `/static/css/main.css`.
    fn url_path(&self, path: &Path) -> String {
        let root = self.sources.watch_root();
        let relative = path
            .strip_prefix(&root)
            .or_else(|_| path.strip_prefix(self.sources.root()))
            .unwrap_or(path);

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        format!("/{}", segments.join("/"))
    }
}

/// Outcome of one change batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Tasks to run, each at most once, in order of first match
    pub tasks: Vec<String>,

    /// At most one message for browsers
    pub reload: Option<ReloadMessage>,
}

/// The dev loop: runs bound tasks on source changes and broadcasts reloads
/// on output changes.
pub struct WatchController {
    graph: Arc<TaskGraph>,
    bindings: Vec<WatchBinding>,
    hub: ReloadHub,
    cancel: CancellationToken,
}

impl WatchController {
    pub fn new(graph: Arc<TaskGraph>, bindings: Vec<WatchBinding>, hub: ReloadHub) -> Self {
        Self {
            graph,
            bindings,
            hub,
            cancel: CancellationToken::new(),
        }
    }

    /// Every directory the bindings need watched.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        self.bindings.iter().map(WatchBinding::watch_root).collect()
    }

    /// Decide what a batch of changed paths triggers.
    ///
    /// A batch yields one reload message at most: a full reload if any
    /// changed output needs one, otherwise a single inject listing every
    /// changed asset.
    pub fn dispatch(&self, paths: &[PathBuf]) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let mut full_reload = false;
        let mut assets: Vec<ChangedAsset> = Vec::new();

        for path in paths {
            for binding in self.bindings.iter().filter(|b| b.matches(path)) {
                match &binding.action {
                    WatchAction::Run(task) => {
                        if !dispatch.tasks.contains(task) {
                            dispatch.tasks.push(task.clone());
                        }
                    }
                    WatchAction::Reload if is_source_map(path) => {}
                    WatchAction::Reload => {
                        let kind = path
                            .extension()
                            .and_then(|e| e.to_str())
                            .and_then(AssetKind::from_extension);
                        match kind {
                            Some(kind) => {
                                let asset = ChangedAsset {
                                    path: binding.url_path(path),
                                    kind,
                                };
                                if !assets.contains(&asset) {
                                    assets.push(asset);
                                }
                            }
                            None => full_reload = true,
                        }
                    }
                }
            }
        }

        dispatch.reload = if full_reload {
            Some(ReloadMessage::Reload)
        } else if !assets.is_empty() {
            Some(ReloadMessage::Inject { assets })
        } else {
            None
        };

        dispatch
    }

    /// Act on one batch: spawn the matched tasks and broadcast the reload.
    ///
    /// Tasks are not serialized against earlier runs of themselves; a second
    /// run may overlap the first.
    pub fn handle(&self, paths: &[PathBuf]) -> Vec<JoinHandle<()>> {
        let dispatch = self.dispatch(paths);

        let handles = dispatch
            .tasks
            .into_iter()
            .map(|task| {
                tracing::info!("Change detected, running '{}'", task);
                let graph = Arc::clone(&self.graph);
                let ctx = TaskContext::with_token(self.cancel.child_token());

                tokio::spawn(async move {
                    if let Err(e) = graph.run_task(&task, &ctx).await {
                        tracing::error!("Rebuild of '{}' failed: {}", task, e);
                    }
                })
            })
            .collect();

        if let Some(msg) = dispatch.reload {
            tracing::debug!("Broadcasting {:?}", msg);
            self.hub.send(msg);
        }

        handles
    }

    /// Process change batches until the channel closes or
    /// [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeBatch>) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                batch = events.recv() => match batch {
                    Some(paths) => {
                        self.handle(&paths);
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Watch loop stopped");
    }

    /// Cancel every in-flight task and stop [`run`](Self::run).
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Source maps are only fetched by devtools; a rebuilt map never needs a
/// browser update of its own.
fn is_source_map(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("map"))
}
