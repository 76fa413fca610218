//! Question papers: one file per (year, semester, subject, exam type).

use crate::catalog::CatalogStore;
use crate::config::CoreConfig;
use crate::models::{IncomingFile, QuestionPaperFilter, QuestionPaperInput, QuestionPaperRecord};
use crate::{parse_id, CatalogError, CatalogResult};
use api_shared::wire::{PaperEntry, QuestionPaperTree, QuestionPaperUploadRes};
use chrono::Utc;
use portal_files::{Ingestor, UploadTarget};
use portal_uuid::CatalogId;
use std::io::Read;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct QuestionPaperService {
    store: Arc<dyn CatalogStore>,
    ingestor: Ingestor,
}

impl QuestionPaperService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CatalogStore>) -> CatalogResult<Self> {
        let ingestor = Ingestor::new(cfg.storage_root())?;
        Ok(Self { store, ingestor })
    }

    /// Stores a question paper, overwriting the record for the same key in place.
    ///
    /// # Errors
    ///
    /// - `Files(Validation)` for blank fields or a semester outside `1..=8`
    /// - `Files` for media type, size and write failures
    /// - store errors from the upsert; the new file is removed again in that case
    pub fn upload<R: Read>(
        &self,
        input: &QuestionPaperInput,
        file: IncomingFile<R>,
    ) -> CatalogResult<QuestionPaperUploadRes> {
        let target = UploadTarget::question_paper(
            &input.year,
            input.semester,
            &input.subject,
            &input.exam_type,
        )?;

        let stored = self.ingestor.ingest(
            &target,
            &file.original_name,
            &file.content_type,
            file.body,
        )?;

        let record = QuestionPaperRecord {
            id: CatalogId::new(),
            year: input.year.trim().to_owned(),
            semester: input.semester,
            subject: input.subject.trim().to_owned(),
            exam_type: input.exam_type.trim().to_owned(),
            file_path: stored.relative_path.to_string(),
            file_name: stored.original_name.clone(),
            uploaded_by: input.uploaded_by.trim().to_owned(),
            upload_date: Utc::now(),
        };

        let upserted = match self.store.upsert_question_paper(record) {
            Ok(upserted) => upserted,
            Err(e) => {
                self.ingestor.remove_superseded(stored.relative_path.as_str());
                return Err(e);
            }
        };
        if let Some(previous) = &upserted.previous {
            if previous.file_path != upserted.record.file_path {
                self.ingestor.remove_superseded(&previous.file_path);
            }
        }

        let replaced = upserted.previous.is_some();
        tracing::info!(
            "{} question paper {} {} {}/{}",
            if replaced { "replaced" } else { "added" },
            upserted.record.subject,
            upserted.record.exam_type,
            upserted.record.year,
            upserted.record.semester
        );
        Ok(QuestionPaperUploadRes {
            message: if replaced {
                "Question paper updated successfully".into()
            } else {
                "Question paper uploaded successfully".into()
            },
            id: upserted.record.id.to_string(),
            file_path: upserted.record.file_path,
            file_name: upserted.record.file_name,
            replaced,
        })
    }

    /// All papers nested as `year → semester → subject → examType`.
    pub fn list(&self) -> CatalogResult<QuestionPaperTree> {
        let mut tree = QuestionPaperTree::default();
        for paper in self
            .store
            .find_question_papers(&QuestionPaperFilter::default())?
        {
            tree.0
                .entry(paper.year)
                .or_default()
                .entry(paper.semester)
                .or_default()
                .entry(paper.subject)
                .or_default()
                .insert(
                    paper.exam_type,
                    PaperEntry {
                        id: paper.id.to_string(),
                        file_path: paper.file_path,
                        file_name: paper.file_name,
                    },
                );
        }
        Ok(tree)
    }

    /// Deletes the record, then its file. A failed unlink is logged only.
    pub fn delete(&self, id: &str) -> CatalogResult<()> {
        let id = parse_id(id)?;
        let removed = self
            .store
            .delete_question_paper(&id)?
            .ok_or_else(|| CatalogError::NotFound(format!("question paper {}", id)))?;
        if !removed.file_path.trim().is_empty() {
            self.ingestor.remove_superseded(&removed.file_path);
        }
        tracing::info!("deleted question paper {}", id);
        Ok(())
    }
}
