//! # yamato-plugins
//!
//! Command plugins are TOML manifests under `{data_dir}/commands/` (searched
//! recursively). Each one names a compiled-in handler plus the metadata shown by
//! `/help`. The directory is watched so edits are picked up without a restart.

mod bundled;
mod loader;
mod manifest;
mod watcher;

pub use bundled::install_bundled_commands;
pub use loader::{load_manifests, LoadReport};
pub use manifest::{parse_manifest, CommandManifest};
pub use watcher::spawn_watcher;
