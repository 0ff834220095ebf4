//! Responsive grid partial.
//!
//! Generates a flexbox grid (`.wrapper`, `.row`, `.col-N`, `.offset-N` and
//! per-breakpoint `.col-<name>-N` variants) as a `_grid.css` partial that
//! entry stylesheets pull in with `@import "_grid.css"`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::output::write_output;
use crate::traits::AdapterError;

/// File name of the generated partial.
pub const GRID_FILE: &str = "_grid.css";

static LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(\.\d+)?(px|rem|em|%|vw)$").expect("valid length regex")
});

static BREAKPOINT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid name regex"));

/// Grid settings, the `[grid]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Number of columns
    pub columns: u32,

    /// Gutter between columns
    pub offset: String,

    /// Emit `min-width` queries in ascending order instead of `max-width`
    /// queries in descending order
    pub mobile_first: bool,

    pub container: GridContainer,

    /// Named breakpoints, e.g. `md`, producing `.col-md-N`
    pub breakpoints: BTreeMap<String, GridBreakpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridContainer {
    pub max_width: String,

    /// Horizontal padding of `.wrapper`
    pub fields: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBreakpoint {
    pub width: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

impl Default for GridSettings {
    fn default() -> Self {
        let breakpoint = |width: &str, fields: Option<&str>| GridBreakpoint {
            width: width.to_string(),
            offset: None,
            fields: fields.map(str::to_string),
        };

        Self {
            columns: 12,
            offset: "30px".to_string(),
            mobile_first: false,
            container: GridContainer::default(),
            breakpoints: BTreeMap::from([
                ("lg".to_string(), breakpoint("1200px", None)),
                ("md".to_string(), breakpoint("992px", None)),
                ("sm".to_string(), breakpoint("768px", Some("15px"))),
                ("xs".to_string(), breakpoint("576px", None)),
            ]),
        }
    }
}

impl Default for GridContainer {
    fn default() -> Self {
        Self {
            max_width: "1140px".to_string(),
            fields: "30px".to_string(),
        }
    }
}

impl GridSettings {
    /// Render the grid stylesheet.
    ///
    /// `origin` names the partial in error messages.
    pub fn render(&self, origin: &Path) -> Result<String, AdapterError> {
        self.validate(origin)?;

        let mut css =
            String::from("/* Generated by gantry from [grid]; edits are overwritten. */\n\n");
        let offset = self.offset.as_str();

        // Infallible: writing into a String.
        let _ = write!(
            css,
            ".wrapper {{\n  box-sizing: border-box;\n  max-width: {};\n  margin-left: auto;\n  \
             margin-right: auto;\n  padding-left: {fields};\n  padding-right: {fields};\n}}\n\n",
            self.container.max_width,
            fields = self.container.fields,
        );
        let _ = write!(
            css,
            ".row {{\n  display: flex;\n  flex-wrap: wrap;\n{}}}\n\n",
            row_margins(offset)
        );
        self.columns_css(&mut css, "", offset);

        for (name, breakpoint) in self.ordered_breakpoints() {
            let query = if self.mobile_first { "min-width" } else { "max-width" };
            let _ = writeln!(css, "@media ({}: {}) {{", query, breakpoint.width);

            if let Some(fields) = &breakpoint.fields {
                let _ = write!(
                    css,
                    ".wrapper {{\n  padding-left: {fields};\n  padding-right: {fields};\n}}\n\n"
                );
            }
            let offset = match &breakpoint.offset {
                Some(offset) => {
                    let _ = write!(css, ".row {{\n{}}}\n\n", row_margins(offset));
                    offset.as_str()
                }
                None => offset,
            };
            self.columns_css(&mut css, &format!("{}-", name), offset);

            css.push_str("}\n\n");
        }

        Ok(css)
    }

    /// Write `_grid.css` into `dir` unless it already holds the same content.
    ///
    /// Returns the path when the file was (re)written. Leaving an unchanged
    /// partial untouched keeps a source watcher from seeing a change.
    pub fn write_partial(&self, dir: &Path) -> Result<Option<PathBuf>, AdapterError> {
        let target = dir.join(GRID_FILE);
        let css = self.render(&target)?;

        if fs::read_to_string(&target).is_ok_and(|existing| existing == css) {
            return Ok(None);
        }
        write_output(dir, Path::new(GRID_FILE), css).map(Some)
    }

    fn validate(&self, origin: &Path) -> Result<(), AdapterError> {
        if self.columns == 0 {
            return Err(AdapterError::malformed(origin, "grid needs at least one column"));
        }

        let check = |what: &str, value: &str| {
            if LENGTH.is_match(value) {
                Ok(())
            } else {
                Err(AdapterError::malformed(
                    origin,
                    format!("grid {} `{}` is not a length", what, value),
                ))
            }
        };

        check("offset", &self.offset)?;
        check("container max_width", &self.container.max_width)?;
        check("container fields", &self.container.fields)?;

        for (name, breakpoint) in &self.breakpoints {
            if !BREAKPOINT_NAME.is_match(name) {
                return Err(AdapterError::malformed(
                    origin,
                    format!("grid breakpoint name `{}` is not a valid class fragment", name),
                ));
            }
            check("breakpoint width", &breakpoint.width)?;
            if let Some(offset) = &breakpoint.offset {
                check("breakpoint offset", offset)?;
            }
            if let Some(fields) = &breakpoint.fields {
                check("breakpoint fields", fields)?;
            }
        }

        Ok(())
    }

    /// Breakpoints in cascade order: widest first for `max-width` queries,
    /// narrowest first for `min-width` ones.
    fn ordered_breakpoints(&self) -> Vec<(&String, &GridBreakpoint)> {
        let mut ordered: Vec<_> = self.breakpoints.iter().collect();
        ordered.sort_by(|(a_name, a), (b_name, b)| {
            leading_number(&a.width)
                .total_cmp(&leading_number(&b.width))
                .then_with(|| a_name.cmp(b_name))
        });
        if !self.mobile_first {
            ordered.reverse();
        }
        ordered
    }

    fn columns_css(&self, css: &mut String, prefix: &str, offset: &str) {
        let columns = self.columns;

        for n in 1..=columns {
            let _ = writeln!(css, ".col-{prefix}{n} {{");
            css.push_str("  box-sizing: border-box;\n");
            let _ = writeln!(css, "  margin-left: calc({offset} / 2);");
            let _ = writeln!(css, "  margin-right: calc({offset} / 2);");
            let _ = writeln!(css, "  width: calc(100% / {columns} * {n} - {offset});");
            css.push_str("}\n\n");
        }
        for n in 0..columns {
            let _ = writeln!(css, ".offset-{prefix}{n} {{");
            let _ = writeln!(css, "  margin-left: calc(100% / {columns} * {n} + {offset} / 2);");
            css.push_str("}\n\n");
        }
    }
}

fn row_margins(offset: &str) -> String {
    format!("  margin-left: calc({offset} / -2);\n  margin-right: calc({offset} / -2);\n")
}

fn leading_number(length: &str) -> f64 {
    let end = length
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(length.len());
    length[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn origin() -> PathBuf {
        PathBuf::from(GRID_FILE)
    }

    #[test]
    fn default_grid_has_every_column() {
        let css = GridSettings::default().render(&origin()).unwrap();

        assert!(css.contains(".wrapper {"));
        assert!(css.contains("max-width: 1140px;"));
        assert!(css.contains(".col-12 {"));
        assert!(css.contains("width: calc(100% / 12 * 6 - 30px);"));
        assert!(css.contains(".offset-11 {"));
        assert!(!css.contains(".col-13 "));
        assert!(css.contains(".col-sm-4 {"));
    }

    #[test]
    fn desktop_first_queries_run_widest_first() {
        let css = GridSettings::default().render(&origin()).unwrap();

        let position = |query: &str| css.find(query).unwrap();
        assert!(position("(max-width: 1200px)") < position("(max-width: 992px)"));
        assert!(position("(max-width: 992px)") < position("(max-width: 768px)"));
        assert!(position("(max-width: 768px)") < position("(max-width: 576px)"));
        assert!(!css.contains("min-width"));
    }

    #[test]
    fn mobile_first_queries_run_narrowest_first() {
        let settings = GridSettings {
            mobile_first: true,
            ..Default::default()
        };
        let css = settings.render(&origin()).unwrap();

        let position = |query: &str| css.find(query).unwrap();
        assert!(position("(min-width: 576px)") < position("(min-width: 1200px)"));
        assert!(!css.contains("(max-width"));
    }

    #[test]
    fn breakpoint_overrides_fields_and_offset() {
        let settings = GridSettings {
            columns: 4,
            breakpoints: BTreeMap::from([(
                "sm".to_string(),
                GridBreakpoint {
                    width: "600px".to_string(),
                    offset: Some("10px".to_string()),
                    fields: Some("8px".to_string()),
                },
            )]),
            ..Default::default()
        };
        let css = settings.render(&origin()).unwrap();

        let media = &css[css.find("@media").unwrap()..];
        assert!(media.contains("padding-left: 8px;"));
        assert!(media.contains("margin-left: calc(10px / -2);"));
        assert!(media.contains("width: calc(100% / 4 * 2 - 10px);"));
    }

    #[test]
    fn rejects_bad_settings() {
        let zero = GridSettings {
            columns: 0,
            ..Default::default()
        };
        assert!(matches!(zero.render(&origin()), Err(AdapterError::Malformed { .. })));

        let bad_length = GridSettings {
            offset: "wide".to_string(),
            ..Default::default()
        };
        let err = bad_length.render(&origin()).unwrap_err();
        assert!(err.to_string().contains("`wide`"));
    }

    #[test]
    fn unchanged_partial_is_not_rewritten() {
        let temp = tempdir().unwrap();
        let settings = GridSettings::default();

        let first = settings.write_partial(temp.path()).unwrap();
        assert_eq!(first, Some(temp.path().join(GRID_FILE)));
        assert_eq!(settings.write_partial(temp.path()).unwrap(), None);

        let wider = GridSettings {
            columns: 16,
            ..Default::default()
        };
        assert!(wider.write_partial(temp.path()).unwrap().is_some());
        let css = fs::read_to_string(temp.path().join(GRID_FILE)).unwrap();
        assert!(css.contains(".col-16 {"));
    }
}
