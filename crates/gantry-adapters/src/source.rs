//! Glob-based input sets.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::traits::{AdapterError, SourceFile};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A glob such as `src/static/img/**/*`, split into a static root
/// (`src/static/img`) and a pattern matched against paths below it.
///
/// A glob without wildcards names a single file.
#[derive(Debug, Clone)]
pub struct SourceSet {
    glob: String,
    root: PathBuf,
    absolute_root: PathBuf,
    pattern: Option<Pattern>,
}

impl SourceSet {
    /// Parse a glob.
    pub fn new(glob: impl Into<String>) -> Result<Self, AdapterError> {
        let glob = glob.into();
        let path = Path::new(&glob);

        let components: Vec<Component<'_>> = path.components().collect();
        let split = components
            .iter()
            .position(|c| c.as_os_str().to_string_lossy().contains(['*', '?', '[']))
            .unwrap_or(components.len());

        let root: PathBuf = components[..split].iter().collect();
        let suffix: PathBuf = components[split..].iter().collect();

        let pattern = if suffix.as_os_str().is_empty() {
            None
        } else {
            Some(
                Pattern::new(&suffix.to_string_lossy()).map_err(|e| AdapterError::Pattern {
                    pattern: glob.clone(),
                    message: e.to_string(),
                })?,
            )
        };

        let absolute_root = absolutize(&root);

        Ok(Self {
            glob,
            root,
            absolute_root,
            pattern,
        })
    }

    /// The glob as written.
    pub fn glob(&self) -> &str {
        &self.glob
    }

    /// Static root of the glob (a directory, or the file itself).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory to watch for changes to this set.
    pub fn watch_root(&self) -> PathBuf {
        if self.pattern.is_none() {
            self.absolute_root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.absolute_root.clone())
        } else {
            self.absolute_root.clone()
        }
    }

    /// Every file currently matching the glob, sorted by path.
    ///
    /// A root that does not exist yields an empty set.
    pub fn resolve(&self) -> Result<Vec<SourceFile>, AdapterError> {
        let Some(pattern) = &self.pattern else {
            if self.root.is_file() {
                let name = self
                    .root
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.root.clone());
                return Ok(vec![SourceFile::new(&self.root, name)]);
            }
            return Ok(Vec::new());
        };

        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                AdapterError::io(&path, std::io::Error::other(e.to_string()))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if pattern.matches_path_with(relative, MATCH_OPTIONS) {
                files.push(SourceFile::new(path, relative));
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Whether a path (absolute or relative to the working directory) belongs
    /// to this set.
    pub fn matches(&self, path: &Path) -> bool {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.absolute_root)
        } else {
            path.strip_prefix(&self.root)
        };

        let Ok(relative) = relative else {
            return false;
        };

        match &self.pattern {
            Some(pattern) => pattern.matches_path_with(relative, MATCH_OPTIONS),
            None => relative.as_os_str().is_empty(),
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
