//! Stylesheet compilation with lightningcss.
//!
//! Every non-partial `.css` file is bundled (its `@import`s are inlined),
//! vendor-prefixed for the configured browser targets, and written under the
//! destination with the same relative path. Optimized builds are minified;
//! debug builds are pretty-printed with an external source map.

use std::path::{Path, PathBuf};

use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use serde::{Deserialize, Serialize};

use crate::grid::GridSettings;
use crate::output::write_output;
use crate::traits::{AdapterError, BuildMode, SourceFile, TransformAdapter, TransformReport};

/// Minimum browser major versions to prefix for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub edge: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub ios_saf: Option<u32>,
    pub samsung: Option<u32>,
    pub opera: Option<u32>,
    pub android: Option<u32>,
    pub ie: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(80),
            edge: Some(80),
            firefox: Some(78),
            safari: Some(13),
            ios_saf: Some(13),
            samsung: None,
            opera: None,
            android: None,
            ie: None,
        }
    }
}

impl BrowserTargets {
    fn to_targets(&self) -> Targets {
        // lightningcss packs versions as major << 16 | minor << 8 | patch.
        let version = |major: Option<u32>| major.map(|m| m << 16);

        Targets::from(Browsers {
            android: version(self.android),
            chrome: version(self.chrome),
            edge: version(self.edge),
            firefox: version(self.firefox),
            ie: version(self.ie),
            ios_saf: version(self.ios_saf),
            opera: version(self.opera),
            safari: version(self.safari),
            samsung: version(self.samsung),
        })
    }
}

/// Stylesheet adapter.
#[derive(Debug, Clone)]
pub struct StylesAdapter {
    mode: BuildMode,
    targets: BrowserTargets,
    grid: Option<(GridSettings, PathBuf)>,
}

impl StylesAdapter {
    /// Create a styles adapter for a build mode.
    pub fn new(mode: BuildMode, targets: BrowserTargets) -> Self {
        Self {
            mode,
            targets,
            grid: None,
        }
    }

    /// Generate the `_grid.css` partial into `dir` before each run.
    pub fn with_grid(mut self, settings: GridSettings, dir: impl Into<PathBuf>) -> Self {
        self.grid = Some((settings, dir.into()));
        self
    }

    /// Compile one entry stylesheet, returning CSS and an optional source map.
    pub fn compile(&self, path: &Path) -> Result<(String, Option<String>), AdapterError> {
        let fs = FileProvider::new();
        let optimized = self.mode.is_optimized();
        let mut source_map = if optimized {
            None
        } else {
            Some(SourceMap::new("/"))
        };

        let mut stylesheet = {
            let mut bundler = Bundler::new(&fs, source_map.as_mut(), ParserOptions::default());
            bundler
                .bundle(path)
                .map_err(|e| AdapterError::malformed(path, e.to_string()))?
        };

        stylesheet
            .minify(MinifyOptions {
                targets: self.targets.to_targets(),
                ..Default::default()
            })
            .map_err(|e| AdapterError::malformed(path, e.to_string()))?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: optimized,
                source_map: source_map.as_mut(),
                targets: self.targets.to_targets(),
                ..Default::default()
            })
            .map_err(|e| AdapterError::malformed(path, e.to_string()))?;

        let map = match source_map.as_mut() {
            Some(map) => Some(
                map.to_json(None)
                    .map_err(|e| AdapterError::malformed(path, format!("{:?}", e)))?,
            ),
            None => None,
        };

        Ok((printed.code, map))
    }
}

impl TransformAdapter for StylesAdapter {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn transform(
        &self,
        sources: &[SourceFile],
        dest: &Path,
    ) -> Result<TransformReport, AdapterError> {
        let mut report = TransformReport::default();

        if let Some((grid, dir)) = &self.grid {
            if let Some(path) = grid.write_partial(dir)? {
                tracing::debug!("Generated {}", path.display());
            }
        }

        for source in sources {
            if source.extension() != "css" || source.is_partial() {
                continue;
            }

            let (mut css, map) = self.compile(&source.path)?;

            if let Some(map) = map {
                let map_relative = append_extension(&source.relative, "map");
                let map_name = map_relative
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("style.css.map");
                css.push_str(&format!("\n/*# sourceMappingURL={} */\n", map_name));
                report.wrote(write_output(dest, &map_relative, map)?);
            }

            report.wrote(write_output(dest, &source.relative, css)?);
        }

        Ok(report)
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CSS: &str = r#"
.button {
    background-color: blue;
    padding: 10px;
}

.button {
    user-select: none;
}
"#;

    fn source(dir: &Path, name: &str, contents: &str) -> SourceFile {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        SourceFile::new(path, name)
    }

    #[test]
    fn optimized_output_is_minified() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        let file = source(&src, "main.css", CSS);

        let debug_out = temp.path().join("debug");
        let opt_out = temp.path().join("opt");

        StylesAdapter::new(BuildMode::Debug, BrowserTargets::default())
            .transform(std::slice::from_ref(&file), &debug_out)
            .unwrap();
        let report = StylesAdapter::new(BuildMode::Optimized, BrowserTargets::default())
            .transform(std::slice::from_ref(&file), &opt_out)
            .unwrap();

        let debug = fs::read_to_string(debug_out.join("main.css")).unwrap();
        let optimized = fs::read_to_string(opt_out.join("main.css")).unwrap();

        assert!(optimized.len() <= debug.len());
        assert!(!optimized.contains('\n'));
        assert!(!optimized.contains("sourceMappingURL"));
        assert!(debug.contains("sourceMappingURL=main.css.map"));
        assert!(debug_out.join("main.css.map").exists());
        assert!(!opt_out.join("main.css.map").exists());
        assert_eq!(report.written, vec![opt_out.join("main.css")]);
    }

    #[test]
    fn applies_vendor_prefixes() {
        let temp = tempdir().unwrap();
        let file = source(temp.path(), "main.css", CSS);
        let out = temp.path().join("out");

        StylesAdapter::new(BuildMode::Optimized, BrowserTargets::default())
            .transform(&[file], &out)
            .unwrap();

        let css = fs::read_to_string(out.join("main.css")).unwrap();
        assert!(css.contains("-webkit-user-select"));
    }

    #[test]
    fn inlines_imports_and_skips_partials() {
        let temp = tempdir().unwrap();
        let partial = source(temp.path(), "_vars.css", ".partial { color: red; }");
        let main = source(
            temp.path(),
            "main.css",
            "@import \"_vars.css\";\n.main { color: blue; }",
        );
        let out = temp.path().join("out");

        StylesAdapter::new(BuildMode::Optimized, BrowserTargets::default())
            .transform(&[partial, main], &out)
            .unwrap();

        let css = fs::read_to_string(out.join("main.css")).unwrap();
        assert!(css.contains(".partial"));
        assert!(css.contains(".main"));
        assert!(!out.join("_vars.css").exists());
    }

    #[test]
    fn generated_grid_is_importable() {
        let temp = tempdir().unwrap();
        let main = source(
            temp.path(),
            "main.css",
            "@import \"_grid.css\";\n.main { color: blue; }",
        );
        let out = temp.path().join("out");

        StylesAdapter::new(BuildMode::Optimized, BrowserTargets::default())
            .with_grid(GridSettings::default(), temp.path())
            .transform(&[main], &out)
            .unwrap();

        let css = fs::read_to_string(out.join("main.css")).unwrap();
        assert!(css.contains(".col-12"));
        assert!(css.contains(".col-md-6"));
        assert!(css.contains(".main"));
        assert!(temp.path().join(crate::grid::GRID_FILE).exists());
        assert!(!out.join(crate::grid::GRID_FILE).exists());
    }

    #[test]
    fn malformed_stylesheet_fails() {
        let temp = tempdir().unwrap();
        let file = source(temp.path(), "broken.css", "..bad { color: red; }");

        let err = StylesAdapter::new(BuildMode::Debug, BrowserTargets::default())
            .transform(&[file], &temp.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, AdapterError::Malformed { .. }));
    }

    #[test]
    fn output_is_stable_across_runs() {
        let temp = tempdir().unwrap();
        let file = source(temp.path(), "main.css", CSS);
        let out = temp.path().join("out");
        let adapter = StylesAdapter::new(BuildMode::Debug, BrowserTargets::default());

        adapter.transform(std::slice::from_ref(&file), &out).unwrap();
        let first = fs::read(out.join("main.css")).unwrap();
        adapter.transform(std::slice::from_ref(&file), &out).unwrap();
        let second = fs::read(out.join("main.css")).unwrap();

        assert_eq!(first, second);
    }
}
