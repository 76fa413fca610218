//! Constants used throughout the portal core crate.

/// Default storage root for uploaded files when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "uploads";

/// Default directory for catalog records when no explicit directory is configured.
pub const DEFAULT_CATALOG_DIR: &str = "catalog";

/// Catalog collection holding resource records.
pub const RESOURCES_COLLECTION: &str = "resources";

/// Catalog collection holding subject records.
pub const SUBJECTS_COLLECTION: &str = "subjects";

/// Catalog collection holding question-paper records.
pub const QUESTION_PAPERS_COLLECTION: &str = "question-papers";

/// Filename of a single catalog record inside its sharded directory.
pub const RECORD_FILENAME: &str = "record.yaml";

/// Media type used when a stored file's type cannot be derived from its extension.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";
