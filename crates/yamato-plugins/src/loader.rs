//! Manifest discovery.

use crate::manifest::{parse_manifest, CommandManifest};
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use yamato_core::error::YamatoError;

/// Result of scanning the commands directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub manifests: Vec<CommandManifest>,
    /// Files that failed to parse or validate, with the reason.
    pub rejected: Vec<(PathBuf, String)>,
}

/// Load every `*.toml` manifest under `dir`, recursively.
///
/// An unreadable root directory is an error so the caller can keep its
/// current commands. Bad individual files are logged and skipped.
pub fn load_manifests(dir: &Path) -> Result<LoadReport, YamatoError> {
    let mut files = Vec::new();
    collect_manifest_files(dir, &mut files).map_err(|e| {
        YamatoError::Plugin(format!("cannot read commands dir {}: {e}", dir.display()))
    })?;
    files.sort();

    let mut report = LoadReport::default();
    for path in files {
        let source = path.display().to_string();
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| YamatoError::Plugin(format!("{source}: {e}")))
            .and_then(|content| parse_manifest(&content, &source));
        match parsed {
            Ok(m) => report.manifests.push(m),
            Err(e) => {
                error!("failed to load command: {e}");
                report.rejected.push((path, e.to_string()));
            }
        }
    }
    Ok(report)
}

fn collect_manifest_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let (path, file_type) = match entry.and_then(|e| Ok((e.path(), e.file_type()?))) {
            Ok(found) => found,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        // Symlinked directories may point back at an ancestor.
        if file_type.is_symlink() && path.is_dir() {
            warn!("skipping symlinked directory {}", path.display());
        } else if file_type.is_dir() {
            if let Err(e) = collect_manifest_files(&path, out) {
                warn!("skipping {}: {e}", path.display());
            }
        } else if is_manifest(&path) {
            out.push(path);
        }
    }
    Ok(())
}

pub(crate) fn is_manifest(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}
