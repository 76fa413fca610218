//! Download lookup: catalog id to a file on disk.
//!
//! Only the resolver's canonical and structural tiers run here; the exhaustive walk is reserved
//! for the repair tool.

use crate::catalog::CatalogStore;
use crate::config::CoreConfig;
use crate::constants::FALLBACK_MEDIA_TYPE;
use crate::models::{QuestionPaperRecord, ResourceRecord};
use crate::{parse_id, CatalogError, CatalogResult};
use portal_files::{ResolveQuery, ResolveTier, Resolver};
use portal_uuid::CatalogId;
use std::path::PathBuf;
use std::sync::Arc;

/// A located file ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    /// Name to present in `Content-Disposition`
    pub file_name: String,
    pub media_type: String,
    pub tier: ResolveTier,
}

#[derive(Debug, Clone)]
pub struct DownloadService {
    store: Arc<dyn CatalogStore>,
    resolver: Resolver,
}

impl DownloadService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            resolver: Resolver::new(cfg.storage_root()),
        }
    }

    /// Locates a notes/books file or a question paper by record id.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a malformed id
    /// - `NotFound` when no file-backed record has this id
    /// - `FileMissing` with the attempted paths when the record's file cannot be found
    pub fn locate(&self, id: &str) -> CatalogResult<Download> {
        let id = parse_id(id)?;
        if let Some(resource) = self.store.get_resource(&id)? {
            if resource.has_file() {
                return self.locate_resource(&resource);
            }
        }
        match self.store.get_question_paper(&id)? {
            Some(paper) => self.locate_paper(&paper),
            None => Err(not_found(&id)),
        }
    }

    /// Locates a question paper by record id.
    pub fn locate_question_paper(&self, id: &str) -> CatalogResult<Download> {
        let id = parse_id(id)?;
        let paper = self
            .store
            .get_question_paper(&id)?
            .ok_or_else(|| not_found(&id))?;
        self.locate_paper(&paper)
    }

    fn locate_resource(&self, record: &ResourceRecord) -> CatalogResult<Download> {
        let query = ResolveQuery::resource(
            &record.semester,
            record.resource_type,
            &record.subject,
            &record.file_url,
            &record.file_name,
        );
        self.resolve(&record.id, &query, &record.file_name)
    }

    fn locate_paper(&self, record: &QuestionPaperRecord) -> CatalogResult<Download> {
        let query = ResolveQuery::question_paper(
            &record.year,
            record.semester,
            &record.subject,
            &record.exam_type,
            &record.file_path,
            &record.file_name,
        );
        self.resolve(&record.id, &query, &record.file_name)
    }

    fn resolve(
        &self,
        id: &CatalogId,
        query: &ResolveQuery,
        file_name: &str,
    ) -> CatalogResult<Download> {
        let resolved = self.resolver.resolve(query).map_err(|e| {
            tracing::warn!("dangling reference for record {}", id);
            CatalogError::file_missing(id, e)
        })?;
        if resolved.tier != ResolveTier::Canonical {
            tracing::info!(
                "record {} resolved via {:?} tier to {}",
                id,
                resolved.tier,
                resolved.path.display()
            );
        }

        let file_name = if file_name.trim().is_empty() {
            resolved
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.to_string())
        } else {
            file_name.trim().to_owned()
        };
        Ok(Download {
            media_type: media_type_for(&resolved.path),
            path: resolved.path,
            file_name,
            tier: resolved.tier,
        })
    }
}

fn not_found(id: &CatalogId) -> CatalogError {
    CatalogError::NotFound(format!("no downloadable record with id {}", id))
}

fn media_type_for(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => FALLBACK_MEDIA_TYPE,
    }
    .to_owned()
}
