use portal_files::{FilesError, ResolveError};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("file for record {id} not found")]
    FileMissing { id: String, attempted: Vec<PathBuf> },
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read catalog record: {0}")]
    RecordRead(std::io::Error),
    #[error("failed to write catalog record: {0}")]
    RecordWrite(std::io::Error),
    #[error("failed to delete catalog record: {0}")]
    RecordDelete(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

impl CatalogError {
    /// Maps a resolver miss for record `id` into [`CatalogError::FileMissing`].
    pub fn file_missing(id: impl ToString, err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { attempted } => CatalogError::FileMissing {
                id: id.to_string(),
                attempted,
            },
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
