//! Resource catalog file storage
//!
//! This crate owns everything that touches the *bytes* of catalogued resources. Catalog records
//! (owned by `portal-core`) only hold a reference to a stored file; this crate decides where such
//! a file is written and how a possibly stale reference is turned back into a real file.
//!
//! ## Design Principles
//!
//! - The catalog owns the reference, the filesystem owns the bytes
//! - A dangling reference is a recoverable state, never a fatal one
//! - Path derivation is pure: no filesystem or catalog access (see [`paths`])
//! - Resolution is read-only: it never mutates the storage tree (see [`resolve`])
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! ├── resources/
//! │   └── sem<semester>/
//! │       └── <resourceType>/
//! │           └── <Subject>_<millis>-<nonce>.pdf
//! ├── question-papers/
//! │   └── <year>/
//! │       └── <semester>/
//! │           └── <Subject>_<ExamType>_<millis>-<nonce>.pdf
//! └── events/
//!     └── event-<millis>-<nonce>.png
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use portal_files::{Ingestor, UploadTarget};
//! use portal_types::ResourceType;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ingestor = Ingestor::new(Path::new("uploads"))?;
//! let target = UploadTarget::resource("3", ResourceType::Notes, "Data Structures")?;
//! let stored = ingestor.ingest(&target, "ds.pdf", "application/pdf", &b"%PDF-1.4"[..])?;
//! println!("stored at {}", stored.relative_path);
//! # Ok(())
//! # }
//! ```

mod constants;
pub mod ingest;
pub mod media;
pub mod paths;
pub mod resolve;

use std::path::PathBuf;

pub use constants::{
    EVENTS_DIR_NAME, LEGACY_UPLOADS_SEGMENT, QUESTION_PAPERS_DIR_NAME, RESOURCES_DIR_NAME,
};
pub use ingest::{Ingestor, StoredFile, UploadTarget};
pub use media::{AcceptedMedia, MediaCategory};
pub use paths::{is_safe_relative, normalize_stored_path, sanitize_fragment, RelativeStoragePath};
pub use resolve::{ResolveQuery, ResolveTier, Resolved, Resolver};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Storage root does not exist or is not a directory
    #[error("Invalid storage root: {0}")]
    InvalidRootDirectory(String),

    /// Required upload metadata is missing or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Declared media type, extension or content is not allowed for the upload category
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Upload exceeds the byte limit of its category
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// Path validation failed (directory traversal or unusable path)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file operations.
pub type FilesResult<T> = Result<T, FilesError>;

/// Resolution failure: no tier located the file.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Every tier missed; `attempted` lists each path or directory that was examined.
    #[error("file not found after {} attempt(s)", attempted.len())]
    NotFound { attempted: Vec<PathBuf> },
}
