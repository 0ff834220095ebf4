//! Trait definitions for transform adapters.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Debug or optimized output, chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Readable output with source maps
    #[default]
    Debug,

    /// Minified and compacted output
    Optimized,
}

impl BuildMode {
    /// Whether compaction passes should run.
    pub fn is_optimized(self) -> bool {
        matches!(self, BuildMode::Optimized)
    }

    /// Lowercase name, as used in config and bundler arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Optimized => "optimized",
        }
    }
}

/// An input file matched by a source set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,

    /// Path relative to the source set root; mirrored under the destination
    pub relative: PathBuf,
}

impl SourceFile {
    /// Create a source file entry.
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
        }
    }

    /// Lowercase extension, or an empty string.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }

    /// Whether the file name marks a partial (leading underscore).
    pub fn is_partial(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'))
    }
}

/// Result of running an adapter over a set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    /// Files written under the destination
    pub written: Vec<PathBuf>,

    /// Problems that did not stop the transform
    pub warnings: Vec<String>,
}

impl TransformReport {
    /// Record a written file.
    pub fn wrote(&mut self, path: PathBuf) {
        self.written.push(path);
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: TransformReport) {
        self.written.extend(other.written);
        self.warnings.extend(other.warnings);
    }
}

/// Errors that can occur during a transform.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("External tool `{program}` failed: {message}")]
    External { program: String, message: String },

    #[error("Invalid pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
}

impl AdapterError {
    /// Malformed input at a path.
    pub fn malformed(path: &Path, message: impl ToString) -> Self {
        AdapterError::Malformed {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// I/O failure at a path.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        AdapterError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Trait for asset-class adapters.
pub trait TransformAdapter: Send + Sync {
    /// Asset class identifier (e.g., "styles", "images")
    fn name(&self) -> &'static str;

    /// Transform the matched inputs into `dest`.
    ///
    /// # Arguments
    /// * `sources` - Files matched by the task's source set
    /// * `dest` - Destination directory; created if absent, never cleared
    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError>;
}
