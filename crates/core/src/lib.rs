//! # Portal Core
//!
//! Catalog and file logic for the academic resource portal.
//!
//! This crate owns the catalog of resources, subjects and question papers, and ties each record
//! to the file the storage layer ingested for it:
//! - Uploads, listings and cascade deletes for notes, books and video channels
//! - Question paper uploads keyed by year, semester, subject and exam type
//! - Download lookup through the file resolver
//! - The repair tool: diagnose, fix, normalize and reconcile
//!
//! **No API concerns**: authentication and HTTP handling belong in `api-rest` and `api-shared`.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod downloads;
pub mod error;
pub mod models;
pub mod question_papers;
pub mod repair;
pub mod resources;

// Wire types are shared with the HTTP layer.
pub use api_shared::wire;

pub use catalog::{CatalogStore, FileCatalogStore};
pub use config::{ensure_directory_root, CoreConfig};
pub use downloads::{Download, DownloadService};
pub use error::{CatalogError, CatalogResult};
pub use models::{
    FileResourceInput, IncomingFile, QuestionPaperFilter, QuestionPaperInput,
    QuestionPaperRecord, ResourceFilter, ResourceRecord, SubjectRecord, Upserted,
    VideoChannelInput,
};
pub use question_papers::QuestionPaperService;
pub use repair::RepairService;
pub use resources::ResourceService;

use portal_uuid::CatalogId;

/// Parses a record id supplied by a caller.
pub(crate) fn parse_id(id: &str) -> CatalogResult<CatalogId> {
    CatalogId::parse(id.trim())
        .map_err(|_| CatalogError::InvalidInput(format!("'{}' is not a valid record id", id)))
}
