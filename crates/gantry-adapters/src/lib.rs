//! Transform adapters for each asset class.
//!
//! An adapter takes the files matched by a [`SourceSet`] and writes transformed
//! output under a destination directory. Adapters are synchronous and run on
//! blocking threads; the pipeline decides when and in what order they run.

pub mod copy;
pub mod grid;
pub mod images;
pub mod output;
pub mod scripts;
pub mod source;
pub mod styles;
pub mod templates;
pub mod traits;
pub mod validate;

pub use copy::CopyAdapter;
pub use grid::{GridBreakpoint, GridContainer, GridSettings};
pub use images::ImagesAdapter;
pub use output::{clean_dir, write_output};
pub use scripts::ScriptsAdapter;
pub use source::SourceSet;
pub use styles::{BrowserTargets, StylesAdapter};
pub use templates::{TemplateValidation, TemplatesAdapter};
pub use traits::{AdapterError, BuildMode, SourceFile, TransformAdapter, TransformReport};
pub use validate::{validate_bem, validate_html, Diagnostic};
