//! Script entry handling: syntax check with oxc, then either an external
//! bundler command or a plain copy.

use std::path::{Path, PathBuf};
use std::process::Command;

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::output::{read_source_text, write_output};
use crate::traits::{AdapterError, BuildMode, SourceFile, TransformAdapter, TransformReport};

/// Script adapter.
#[derive(Debug, Clone)]
pub struct ScriptsAdapter {
    mode: BuildMode,
    bundler: Option<Vec<String>>,
}

impl ScriptsAdapter {
    /// Create a script adapter.
    ///
    /// `bundler` is a program followed by its arguments; `{input}`,
    /// `{output}` and `{mode}` are substituted before it runs.
    pub fn new(mode: BuildMode, bundler: Option<Vec<String>>) -> Self {
        Self {
            mode,
            bundler: bundler.filter(|cmd| !cmd.is_empty()),
        }
    }

    /// Parse the file and fail on any syntax error.
    pub fn check_syntax(path: &Path, source: &str) -> Result<(), AdapterError> {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(path).unwrap_or_default();
        let parsed = Parser::new(&allocator, source, source_type).parse();

        if parsed.errors.is_empty() {
            return Ok(());
        }

        let message = parsed
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(AdapterError::malformed(path, message))
    }

    fn bundle(&self, command: &[String], input: &Path, output: &Path) -> Result<(), AdapterError> {
        let substitute = |arg: &String| {
            arg.replace("{input}", &input.to_string_lossy())
                .replace("{output}", &output.to_string_lossy())
                .replace("{mode}", self.mode.as_str())
        };

        let program = substitute(&command[0]);
        let args: Vec<String> = command[1..].iter().map(substitute).collect();

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AdapterError::io(parent, e))?;
        }

        tracing::debug!("Running bundler: {} {}", program, args.join(" "));

        let result = Command::new(&program)
            .args(&args)
            .output()
            .map_err(|e| AdapterError::External {
                program: program.clone(),
                message: e.to_string(),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AdapterError::External {
                program,
                message: format!("{} {}", result.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

impl TransformAdapter for ScriptsAdapter {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError> {
        let mut report = TransformReport::default();

        for source in sources {
            let text = read_source_text(&source.path)?;
            Self::check_syntax(&source.path, &text)?;

            let output = output_name(&source.relative);

            match &self.bundler {
                Some(command) => {
                    let target = dest.join(&output);
                    self.bundle(command, &source.path, &target)?;
                    report.wrote(target);
                }
                None => {
                    let mut contents = text;
                    if !self.mode.is_optimized() {
                        if !contents.ends_with('\n') {
                            contents.push('\n');
                        }
                        contents.push_str(&format!(
                            "//# sourceURL={}\n",
                            source.path.to_string_lossy()
                        ));
                    }
                    report.wrote(write_output(dest, &output, contents)?);
                }
            }
        }

        Ok(report)
    }
}

/// Scripts are emitted as `.js` regardless of the entry's extension.
fn output_name(relative: &Path) -> PathBuf {
    let name = relative.file_name().map(PathBuf::from).unwrap_or_default();
    name.with_extension("js")
}
