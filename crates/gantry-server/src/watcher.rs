//! File watching for the dev loop.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use crate::server::ServerError;

/// Paths touched by one filesystem notification.
pub type ChangeBatch = Vec<PathBuf>;

/// File watcher for detecting changes.
///
/// Every notification from the OS becomes one [`ChangeBatch`]; the
/// controller decides what a batch triggers.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Create a new file watcher for the given directories.
    ///
    /// Nested roots are watched once through their outermost ancestor.
    /// A root that does not exist yet is watched through its nearest
    /// existing ancestor, so directories created later are still seen.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<ChangeBatch>), ServerError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })?;

        let existing: Vec<PathBuf> = collapse_roots(paths)
            .into_iter()
            .filter_map(|root| {
                let ancestor = existing_ancestor(&root)?;
                if ancestor != root {
                    tracing::info!(
                        "{} does not exist yet, watching {} instead",
                        root.display(),
                        ancestor.display()
                    );
                }
                Some(ancestor)
            })
            .collect();

        let roots = collapse_roots(&existing);
        for root in &roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::debug!("Watching {}", root.display());
        }

        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                if !is_change(&event.kind) || event.paths.is_empty() {
                    continue;
                }
                if async_tx.blocking_send(event.paths).is_err() {
                    break;
                }
            }
        });

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            async_rx,
        ))
    }

    /// Directories actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map(Path::to_path_buf)
}

/// Drop duplicates and roots that live inside another root.
fn collapse_roots(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sorted: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    sorted.sort();
    sorted.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for path in sorted {
        if !roots.iter().any(|root| path.starts_with(root)) {
            roots.push(path.to_path_buf());
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn collapses_nested_roots() {
        let roots = collapse_roots(&[
            PathBuf::from("/site/src/styles"),
            PathBuf::from("/site/src"),
            PathBuf::from("/site/build"),
            PathBuf::from("/site/src/static/img"),
            PathBuf::from("/site/src"),
        ]);

        assert_eq!(
            roots,
            vec![PathBuf::from("/site/build"), PathBuf::from("/site/src")]
        );
    }

    #[test]
    fn sibling_prefixes_are_not_nested() {
        let roots = collapse_roots(&[PathBuf::from("/site/src"), PathBuf::from("/site/src2")]);
        assert_eq!(roots.len(), 2);
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.css");

        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give the OS watcher time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "a { color: red; }").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        let batch = batch.expect("timeout waiting for file watch event");
        let batch = batch.expect("channel should not be closed");
        assert!(batch.iter().any(|p| p.ends_with("main.css")));
    }

    #[tokio::test]
    async fn missing_root_is_watched_through_its_ancestor() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let styles = root.join("src/styles");

        let (watcher, mut rx) = FileWatcher::new(&[styles.clone()]).unwrap();
        assert_eq!(watcher.roots().to_vec(), vec![root.clone()]);

        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("main.css"), "a { color: red; }").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(3), async {
            while let Some(batch) = rx.recv().await {
                if batch.iter().any(|p| p.ends_with("main.css")) {
                    return true;
                }
            }
            false
        })
        .await;
        drop(watcher);

        assert!(matches!(seen, Ok(true)), "no event for a directory created after start");
    }
}
