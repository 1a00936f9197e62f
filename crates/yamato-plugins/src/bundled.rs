//! Default command manifests shipped with the binary.

use std::path::Path;
use tracing::{info, warn};

const BUNDLED: &[(&str, &str)] = &[
    ("help.toml", include_str!("../bundled/help.toml")),
    ("ping.toml", include_str!("../bundled/ping.toml")),
    ("info.toml", include_str!("../bundled/info.toml")),
    ("stats.toml", include_str!("../bundled/stats.toml")),
    ("restart.toml", include_str!("../bundled/restart.toml")),
    ("joke.toml", include_str!("../bundled/joke.toml")),
];

/// Create `dir` and write the bundled manifests into it.
///
/// Never overwrites existing files so user edits are preserved. Returns how
/// many files were written.
pub fn install_bundled_commands(dir: &Path) -> usize {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("commands: failed to create {}: {e}", dir.display());
        return 0;
    }

    let mut written = 0;
    for (filename, content) in BUNDLED {
        let dest = dir.join(filename);
        if dest.exists() {
            continue;
        }
        match std::fs::write(&dest, content) {
            Ok(()) => {
                info!("commands: deployed bundled {filename}");
                written += 1;
            }
            Err(e) => warn!("commands: failed to write {}: {e}", dest.display()),
        }
    }
    written
}
