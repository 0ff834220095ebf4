//! Page rendering with minijinja.

use std::path::{Path, PathBuf};

use minijinja::{context, path_loader, Environment, UndefinedBehavior};
use rayon::prelude::*;

use crate::output::write_output;
use crate::traits::{AdapterError, BuildMode, SourceFile, TransformAdapter, TransformReport};
use crate::validate::{validate_bem, validate_html};

/// How rendered pages are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateValidation {
    /// Run structural HTML validation (doctype, lang, title, balanced tags)
    pub html: bool,

    /// Treat render errors and validation findings as task failures
    pub strict: bool,
}

/// Template adapter.
///
/// Templates are loaded from `root`, so pages can `{% include %}` or
/// `{% extends %}` partials that live anywhere below it.
#[derive(Debug, Clone)]
pub struct TemplatesAdapter {
    mode: BuildMode,
    root: PathBuf,
    validation: TemplateValidation,
}

enum PageOutcome {
    Written(PathBuf, Vec<String>),
    Skipped(String),
}

impl TemplatesAdapter {
    /// Create a template adapter.
    pub fn new(mode: BuildMode, root: impl Into<PathBuf>, validation: TemplateValidation) -> Self {
        Self {
            mode,
            root: root.into(),
            validation,
        }
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(path_loader(&self.root));
        if self.validation.strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }
        env
    }

    fn render_page(
        &self,
        env: &Environment<'static>,
        source: &SourceFile,
        dest: &Path,
    ) -> Result<PageOutcome, AdapterError> {
        let name = template_name(&source.relative);

        let rendered = env
            .get_template(&name)
            .and_then(|tmpl| {
                tmpl.render(context! {
                    mode => self.mode.as_str(),
                    debug => !self.mode.is_optimized(),
                    page => &name,
                })
            });

        let html = match rendered {
            Ok(html) => html,
            Err(e) => {
                let message = format!("{}: {}", source.path.display(), render_error(&e));
                if self.validation.strict {
                    return Err(AdapterError::malformed(&source.path, render_error(&e)));
                }
                return Ok(PageOutcome::Skipped(message));
            }
        };

        let mut findings = validate_bem(&html);
        if self.validation.html {
            findings.extend(validate_html(&html));
        }

        if self.validation.strict && !findings.is_empty() {
            let message = findings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AdapterError::malformed(&source.path, message));
        }

        let warnings = findings
            .into_iter()
            .map(|d| format!("{}: {}", source.path.display(), d))
            .collect();

        let written = write_output(dest, &output_name(&source.relative), html)?;
        Ok(PageOutcome::Written(written, warnings))
    }
}

impl TransformAdapter for TemplatesAdapter {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError> {
        let env = self.environment();

        let outcomes: Vec<Result<PageOutcome, AdapterError>> = sources
            .par_iter()
            .filter(|s| !s.is_partial())
            .map(|source| self.render_page(&env, source, dest))
            .collect();

        let mut report = TransformReport::default();
        for outcome in outcomes {
            match outcome? {
                PageOutcome::Written(path, warnings) => {
                    report.wrote(path);
                    for warning in warnings {
                        report.warn(warning);
                    }
                }
                PageOutcome::Skipped(message) => report.warn(message),
            }
        }

        Ok(report)
    }
}

/// Loader name for a template: its relative path with `/` separators.
fn template_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `about.html.j2` and `about.jinja` render to `about.html`.
fn output_name(relative: &Path) -> PathBuf {
    match relative.extension().and_then(|e| e.to_str()) {
        Some("j2") | Some("jinja") => {
            let stripped = relative.with_extension("");
            if stripped.extension().is_some() {
                stripped
            } else {
                stripped.with_extension("html")
            }
        }
        _ => relative.to_path_buf(),
    }
}

fn render_error(err: &minijinja::Error) -> String {
    match err.line() {
        Some(line) => format!("line {}: {}", line, err),
        None => err.to_string(),
    }
}
