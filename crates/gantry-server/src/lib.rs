//! Development server with live reload for gantry.
//!
//! Serves the build output, watches sources and output for changes, re-runs
//! the affected tasks, and tells connected browsers to reload or swap assets.

pub mod controller;
pub mod livereload;
pub mod server;
pub mod watcher;

pub use controller::{Dispatch, WatchAction, WatchBinding, WatchController};
pub use livereload::{AssetKind, ChangedAsset, ReloadHub, ReloadMessage};
pub use server::{BoundServer, DevServer, DevServerConfig, ServerError};
pub use watcher::{ChangeBatch, FileWatcher};
