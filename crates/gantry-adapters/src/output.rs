//! Writing into and cleaning the output tree.

use std::fs;
use std::path::{Path, PathBuf};

use crate::traits::AdapterError;

/// Write `contents` to `dest/relative`, creating parent directories.
pub fn write_output(
    dest: &Path,
    relative: &Path,
    contents: impl AsRef<[u8]>,
) -> Result<PathBuf, AdapterError> {
    let target = dest.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| AdapterError::io(parent, e))?;
    }
    fs::write(&target, contents).map_err(|e| AdapterError::io(&target, e))?;
    Ok(target)
}

/// Read a source file fully.
pub fn read_source(path: &Path) -> Result<Vec<u8>, AdapterError> {
    fs::read(path).map_err(|e| AdapterError::io(path, e))
}

/// Read a source file as UTF-8 text.
pub fn read_source_text(path: &Path) -> Result<String, AdapterError> {
    fs::read_to_string(path).map_err(|e| AdapterError::io(path, e))
}

/// Remove everything inside `root`, keeping `root` itself.
///
/// Returns the removed top-level entries. A missing root is not an error.
pub fn clean_dir(root: &Path) -> Result<Vec<PathBuf>, AdapterError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AdapterError::io(root, e)),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AdapterError::io(root, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| AdapterError::io(&path, e))?;

        let result = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| AdapterError::io(&path, e))?;
        removed.push(path);
    }

    removed.sort();
    Ok(removed)
}
