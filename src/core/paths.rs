//! core::paths
//!
//! Centralized path routing for airlocal storage locations.
//!
//! # Architecture
//!
//! All on-disk state lives under a single per-user directory. No code
//! outside this module may compute `<home>/.airlocal/...` paths directly;
//! everything goes through [`EnvPaths`].
//!
//! # Storage Layout
//!
//! All airlocal data is stored under `~/.airlocal/`:
//! - `state.json` - Persisted environment state record
//! - `state.json.tmp` - Scratch file for atomic state writes
//! - `lock` - Exclusive operation lock file
//! - `config.toml` - Optional user configuration
//!
//! The root directory can be overridden with the `AIRLOCAL_HOME`
//! environment variable, which is how the test suite redirects state
//! into a temporary directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable that overrides the storage root.
pub const HOME_ENV: &str = "AIRLOCAL_HOME";

/// Name of the per-user storage directory under `$HOME`.
const DEFAULT_DIR_NAME: &str = ".airlocal";

/// Errors from path resolution.
#[derive(Debug, Error)]
pub enum PathsError {
    /// Neither `AIRLOCAL_HOME` nor a home directory is available.
    #[error("cannot determine storage directory: home directory not found")]
    NoHomeDir,
}

/// Centralized path routing for airlocal storage.
///
/// # Invariants
///
/// - Every stored artifact path is computed here
/// - The root is resolved once per invocation and threaded through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvPaths {
    /// Root storage directory (normally `~/.airlocal`).
    root: PathBuf,
}

impl EnvPaths {
    /// Create paths rooted at an explicit directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the storage root from the environment.
    ///
    /// Resolution order:
    /// 1. `$AIRLOCAL_HOME` if set (used by tests and unusual setups)
    /// 2. `~/.airlocal`
    ///
    /// # Errors
    ///
    /// [`PathsError::NoHomeDir`] if neither source is available.
    pub fn resolve() -> Result<Self, PathsError> {
        if let Some(root) = std::env::var_os(HOME_ENV) {
            return Ok(Self::new(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(PathsError::NoHomeDir)?;
        Ok(Self::new(home.join(DEFAULT_DIR_NAME)))
    }

    /// The storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the persisted environment state record.
    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Path to the scratch file used for atomic state writes.
    ///
    /// The store writes here first and renames over [`Self::state_path`].
    pub fn state_tmp_path(&self) -> PathBuf {
        self.root.join("state.json.tmp")
    }

    /// Path to the exclusive operation lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("lock")
    }

    /// Path to the optional user configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Ensure the storage directory exists.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}
