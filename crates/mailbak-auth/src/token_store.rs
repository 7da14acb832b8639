//! Persisted token file
//!
//! The token pair is stored as JSON at a configurable path, written
//! with owner-only permissions. A crash between refresh and persist
//! loses at most one token version; the refresh token stays valid
//! for the next run.

use crate::{AuthResult, TokenPair};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed storage for an OAuth2 token pair
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token pair, if the file exists
    pub fn load(&self) -> AuthResult<Option<TokenPair>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let token = serde_json::from_slice(&data)?;
        debug!("Loaded token from {}", self.path.display());
        Ok(Some(token))
    }

    /// Persist a token pair, overwriting any previous file
    ///
    /// A missing parent directory is created owner-only; an existing
    /// directory keeps its permissions. A bare filename has no parent
    /// to create.
    pub fn save(&self, token: &TokenPair) -> AuthResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                let mut builder = fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::DirBuilderExt;
                    builder.mode(0o700);
                }
                builder.create(dir)?;
            }
        }

        let data = serde_json::to_vec_pretty(token)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&data)?;

        debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}
