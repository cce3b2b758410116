use std::path::PathBuf;

use crate::error::{PackError, Result};

/// Environment variable overriding the library location.
pub const LIBRARY_ENV: &str = "STUDIO_LIBRARY";
/// Library location relative to the home directory.
pub const DEFAULT_LIBRARY_DIR: &str = ".studio/library";

#[derive(Clone, Debug, Default)]
pub struct LibraryOptions {
    /// Takes precedence over the environment and the home-directory default.
    pub root: Option<PathBuf>,
    /// Where converted packs are written; defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl LibraryOptions {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        if let Some(env) = std::env::var_os(LIBRARY_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(env));
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_LIBRARY_DIR))
            .ok_or(PackError::NoLibraryRoot)
    }

    pub fn resolve_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
