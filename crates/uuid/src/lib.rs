//! Identifier utilities for the resource catalog.
//!
//! Two kinds of identifier live here:
//!
//! - [`CatalogId`]: the identifier of a catalog record. It uses a *canonical* UUID representation,
//!   **32 lowercase hexadecimal characters** (no hyphens), so that ids supplied over HTTP or the CLI
//!   can be validated strictly and so record placement on disk is deterministic.
//! - [`UniqueSuffix`]: the `<millisecond-timestamp>-<random-int>` token appended to stored file
//!   names so that concurrent uploads targeting the same logical key never collide.
//!
//! ## Sharded record layout
//!
//! For a canonical id `u`, the file-backed catalog stores a record under:
//! `collection_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `catalog/resources/55/0e/550e8400e29b41d4a716446655440000/`

mod id;
mod suffix;

pub use id::{CatalogId, Uuid};
pub use suffix::UniqueSuffix;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
