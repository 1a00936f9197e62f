//! Filesystem-backed session credentials.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the transport's session database inside the credential directory.
const SESSION_DB: &str = "session.db";

/// Directory holding everything the transport needs to resume a session.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Whether a previous login left credentials behind.
    pub fn exists(&self) -> bool {
        self.session_db_path().exists()
    }

    pub fn session_db_path(&self) -> PathBuf {
        self.dir.join(SESSION_DB)
    }

    /// Delete all credentials. A missing directory is not an error.
    pub fn wipe(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                info!("cleared credentials at {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("failed to clear credentials at {}: {e}", self.dir.display());
                Err(e)
            }
        }
    }
}
