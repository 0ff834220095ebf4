//! Verbatim copies for fonts, favicons and other pass-through assets.

use std::path::Path;

use crate::output::{read_source, write_output};
use crate::traits::{AdapterError, SourceFile, TransformAdapter, TransformReport};

/// Copies every matched file unchanged, mirroring relative paths.
#[derive(Debug, Clone)]
pub struct CopyAdapter {
    name: &'static str,
}

impl CopyAdapter {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl TransformAdapter for CopyAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError> {
        let mut report = TransformReport::default();
        for source in sources {
            let bytes = read_source(&source.path)?;
            report.wrote(write_output(dest, &source.relative, bytes)?);
        }
        Ok(report)
    }
}
