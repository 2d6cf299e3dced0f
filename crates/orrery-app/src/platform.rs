//! Platform directory resolution.
//!
//! The orrery keeps two directories: one for `config.ron` and one for log
//! files. Both default to the OS configuration location and can be rooted
//! elsewhere with `--config`.

use std::io;
use std::path::{Path, PathBuf};

use orrery_config::default_config_dir;

/// Subdirectory of the config directory that receives log files.
const LOG_DIR_NAME: &str = "logs";

/// Errors that can occur during platform operations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// OS-specific directory paths for the orrery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Log files (debug builds only write here).
    pub log_dir: PathBuf,
}

impl PlatformDirs {
    /// Resolve directories without creating them on disk.
    ///
    /// `config_override` replaces the platform config directory, typically
    /// from the `--config` flag.
    pub fn resolve(config_override: Option<&Path>) -> Self {
        let config_dir = config_override
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_dir);
        Self::resolve_with_root(&config_dir)
    }

    /// Resolve directories under an explicit config root.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            log_dir: root.join(LOG_DIR_NAME),
        }
    }

    /// Create all directories on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::CreateDir`] naming the first directory that
    /// could not be created.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [&self.config_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PlatformError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
