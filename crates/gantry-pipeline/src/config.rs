//! `gantry.toml` loading.
//!
//! Every field is optional; the defaults describe a project with sources
//! under `src/` and output under `build/`.

use std::fs;
use std::path::{Path, PathBuf};

use gantry_adapters::{BrowserTargets, BuildMode, GridSettings};
use serde::{Deserialize, Serialize};

/// Default config file name.
pub const CONFIG_FILE: &str = "gantry.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildSettings,
    pub styles: StylesConfig,
    pub templates: TemplatesConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
    pub scripts: ScriptsConfig,
    pub favicon: FaviconConfig,
    pub server: ServerConfig,

    /// Responsive grid partial for the styles task; off unless present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Mode used when `--release` is not passed
    pub mode: BuildMode,

    /// Output root: cleaned by `clean`, served by the dev server
    pub output: PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mode: BuildMode::Debug,
            output: PathBuf::from("build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    pub input: String,
    pub output: PathBuf,
    pub targets: BrowserTargets,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            input: "src/styles/**/*.css".to_string(),
            output: PathBuf::from("build/static/css"),
            targets: BrowserTargets::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub input: String,
    pub output: PathBuf,

    /// Fail the task on render errors and validation findings
    pub strict: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            input: "src/*.html".to_string(),
            output: PathBuf::from("build"),
            strict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub input: String,
    pub output: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            input: "src/static/img/**/*".to_string(),
            output: PathBuf::from("build/static/img"),
            jpeg_quality: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsConfig {
    pub input: String,
    pub output: PathBuf,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            input: "src/static/fonts/**/*".to_string(),
            output: PathBuf::from("build/static/fonts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub entry: String,
    pub output: PathBuf,

    /// External bundler: program and arguments with `{input}`, `{output}`
    /// and `{mode}` placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundler: Option<Vec<String>>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "src/static/js/scripts.js".to_string(),
            output: PathBuf::from("build/static/js"),
            bundler: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaviconConfig {
    pub input: String,
    pub output: PathBuf,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            input: "src/*.ico".to_string(),
            output: PathBuf::from("build"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 0 picks a free port
    pub port: u16,

    /// Open a browser once the server is up
    pub open: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 0, open: true }
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve every relative path and glob against `root`.
    pub fn rebased(mut self, root: &Path) -> Self {
        if root.as_os_str().is_empty() {
            return self;
        }

        let path = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        let glob = |g: &mut String| {
            if Path::new(g.as_str()).is_relative() {
                *g = root.join(g.as_str()).to_string_lossy().into_owned();
            }
        };

        path(&mut self.build.output);
        glob(&mut self.styles.input);
        path(&mut self.styles.output);
        glob(&mut self.templates.input);
        path(&mut self.templates.output);
        glob(&mut self.images.input);
        path(&mut self.images.output);
        glob(&mut self.fonts.input);
        path(&mut self.fonts.output);
        glob(&mut self.scripts.entry);
        path(&mut self.scripts.output);
        glob(&mut self.favicon.input);
        path(&mut self.favicon.output);

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_project_layout() {
        let config = Config::default();

        assert_eq!(config.build.mode, BuildMode::Debug);
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert_eq!(config.styles.input, "src/styles/**/*.css");
        assert_eq!(config.styles.output, PathBuf::from("build/static/css"));
        assert_eq!(config.templates.input, "src/*.html");
        assert_eq!(config.templates.output, PathBuf::from("build"));
        assert_eq!(config.images.input, "src/static/img/**/*");
        assert_eq!(config.images.jpeg_quality, 80);
        assert_eq!(config.fonts.output, PathBuf::from("build/static/fonts"));
        assert_eq!(config.scripts.entry, "src/static/js/scripts.js");
        assert_eq!(config.scripts.bundler, None);
        assert_eq!(config.favicon.input, "src/*.ico");
        assert_eq!(config.server.port, 0);
        assert!(config.server.open);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
[build]
mode = "optimized"

[styles]
input = "assets/css/**/*.css"
targets = { chrome = 100 }

[scripts]
bundler = ["esbuild", "{input}", "--bundle", "--outfile={output}"]

[server]
port = 4000
"#,
        )
        .unwrap();

        assert_eq!(config.build.mode, BuildMode::Optimized);
        assert_eq!(config.build.output, PathBuf::from("build"));
        assert_eq!(config.styles.input, "assets/css/**/*.css");
        assert_eq!(config.styles.output, PathBuf::from("build/static/css"));
        assert_eq!(config.styles.targets.chrome, Some(100));
        assert_eq!(config.scripts.bundler.as_ref().map(Vec::len), Some(4));
        assert_eq!(config.server.port, 4000);
        assert!(config.server.open);
    }

    #[test]
    fn grid_section_is_optional() {
        assert_eq!(Config::default().grid, None);

        let config = Config::parse(
            r#"
[grid]
columns = 16
mobile_first = true

[grid.breakpoints.md]
width = "900px"
fields = "10px"
"#,
        )
        .unwrap();

        let grid = config.grid.unwrap();
        assert_eq!(grid.columns, 16);
        assert!(grid.mobile_first);
        assert_eq!(grid.offset, "30px");
        assert_eq!(grid.container.max_width, "1140px");
        assert_eq!(grid.breakpoints.len(), 1);
        assert_eq!(grid.breakpoints["md"].fields.as_deref(), Some("10px"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = Config::load(&temp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "[build\nmode = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_mode_is_an_error() {
        assert!(Config::parse("[build]\nmode = \"fast\"").is_err());
    }

    #[test]
    fn rebases_relative_paths() {
        let config = Config::default().rebased(Path::new("/site"));

        assert_eq!(config.build.output, PathBuf::from("/site/build"));
        assert_eq!(config.styles.input, "/site/src/styles/**/*.css");
        assert_eq!(config.scripts.entry, "/site/src/static/js/scripts.js");
        assert_eq!(config.favicon.output, PathBuf::from("/site/build"));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), Config::default());
    }
}
