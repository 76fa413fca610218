//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads environment variables.

use crate::constants::{DEFAULT_CATALOG_DIR, DEFAULT_STORAGE_DIR};
use crate::{CatalogError, CatalogResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_root: PathBuf,
    catalog_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// Both directories must already exist; see [`ensure_directory_root`].
    pub fn new(storage_root: PathBuf, catalog_dir: PathBuf) -> CatalogResult<Self> {
        for (label, dir) in [("storage root", &storage_root), ("catalog dir", &catalog_dir)] {
            if !dir.is_dir() {
                return Err(CatalogError::InvalidInput(format!(
                    "{} is not an existing directory: {}",
                    label,
                    dir.display()
                )));
            }
        }
        if storage_root == catalog_dir {
            return Err(CatalogError::InvalidInput(
                "storage root and catalog dir must differ".into(),
            ));
        }

        Ok(Self {
            storage_root,
            catalog_dir,
        })
    }

    /// Resolves the configuration from raw environment values, creating both directories.
    ///
    /// # Arguments
    ///
    /// * `storage_dir` - value of `PORTAL_STORAGE_DIR`, if set
    /// * `catalog_dir` - value of `PORTAL_CATALOG_DIR`, if set
    ///
    /// Blank values fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns `StorageDirCreation` if a directory cannot be created, or `InvalidInput` if both
    /// resolve to the same directory.
    pub fn from_env_values(
        storage_dir: Option<String>,
        catalog_dir: Option<String>,
    ) -> CatalogResult<Self> {
        let pick = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        let storage_root =
            ensure_directory_root(Path::new(&pick(storage_dir, DEFAULT_STORAGE_DIR)))?;
        let catalog_dir = ensure_directory_root(Path::new(&pick(catalog_dir, DEFAULT_CATALOG_DIR)))?;
        Self::new(storage_root, catalog_dir)
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn catalog_dir(&self) -> &Path {
        &self.catalog_dir
    }
}

/// Creates `dir` if it does not exist yet and returns its canonical form.
///
/// Intended for binaries on first start; services assume the directories exist.
pub fn ensure_directory_root(dir: &Path) -> CatalogResult<PathBuf> {
    fs::create_dir_all(dir).map_err(CatalogError::StorageDirCreation)?;
    dir.canonicalize().map_err(CatalogError::StorageDirCreation)
}
