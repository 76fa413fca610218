//! Repair tool
//!
//! Batch operations over every catalog record that references a stored file:
//!
//! - **Diagnose**: classify each record as resolvable or broken, suggesting a fix for broken ones.
//!   Read-only.
//! - **Apply fixes**: overwrite stored paths from caller-supplied `{id, newPath}` pairs.
//! - **Normalize**: strip one leading separator from stored paths.
//! - **Reconcile**: find (and optionally delete) resource records whose subject is gone.
//!
//! No operation fails the whole batch because of a single bad record.

use crate::catalog::CatalogStore;
use crate::config::CoreConfig;
use crate::models::{QuestionPaperFilter, ResourceFilter, ResourceRecord};
use crate::{CatalogError, CatalogResult};
use api_shared::wire::{
    DiagnoseReport, FixOutcome, FixPathsReport, NormalizeOutcome, NormalizeReport,
    NormalizeStatus, OrphanOutcome, PathDiagnosis, PathFix, ReconcileReport, RecordKind,
};
use chrono::Utc;
use portal_files::{
    is_safe_relative, normalize_stored_path, Ingestor, ResolveQuery, Resolver,
    LEGACY_UPLOADS_SEGMENT,
};
use portal_uuid::CatalogId;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A catalog record that references a stored file.
struct FileReference {
    id: CatalogId,
    kind: RecordKind,
    file_name: String,
    stored_path: String,
    query: ResolveQuery,
}

#[derive(Debug, Clone)]
pub struct RepairService {
    store: Arc<dyn CatalogStore>,
    ingestor: Ingestor,
    resolver: Resolver,
}

impl RepairService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CatalogStore>) -> CatalogResult<Self> {
        let ingestor = Ingestor::new(cfg.storage_root())?;
        let resolver = Resolver::new(ingestor.root());
        Ok(Self {
            store,
            ingestor,
            resolver,
        })
    }

    fn file_references(&self) -> CatalogResult<Vec<FileReference>> {
        let mut refs = Vec::new();
        for paper in self
            .store
            .find_question_papers(&QuestionPaperFilter::default())?
        {
            refs.push(FileReference {
                query: ResolveQuery::question_paper(
                    &paper.year,
                    paper.semester,
                    &paper.subject,
                    &paper.exam_type,
                    &paper.file_path,
                    &paper.file_name,
                ),
                id: paper.id,
                kind: RecordKind::QuestionPaper,
                file_name: paper.file_name,
                stored_path: paper.file_path,
            });
        }
        for resource in self
            .store
            .find_resources(&ResourceFilter::default())?
            .into_iter()
            .filter(ResourceRecord::has_file)
        {
            refs.push(FileReference {
                query: ResolveQuery::resource(
                    &resource.semester,
                    resource.resource_type,
                    &resource.subject,
                    &resource.file_url,
                    &resource.file_name,
                ),
                id: resource.id,
                kind: RecordKind::Resource,
                file_name: resource.file_name,
                stored_path: resource.file_url,
            });
        }
        Ok(refs)
    }

    /// Reports, for every file reference, whether its file can be found.
    ///
    /// Runs the resolver's canonical and structural tiers, then the alternate joins from
    /// [`alternate_candidates`]. Broken records get a `suggested_fix` from the exhaustive tier.
    /// Nothing is mutated, so repeated runs over an unchanged tree yield identical reports.
    pub fn diagnose(&self) -> CatalogResult<DiagnoseReport> {
        let mut details = Vec::new();
        for reference in self.file_references()? {
            let found = match self.resolver.resolve(&reference.query) {
                Ok(resolved) => Some(resolved.path),
                Err(_) => alternate_candidates(self.resolver.root(), &reference.stored_path)
                    .into_iter()
                    .find(|candidate| candidate.is_file()),
            };

            let suggested_fix = match found {
                Some(_) => None,
                None => {
                    tracing::warn!(
                        "dangling reference: {:?} {} -> {}",
                        reference.kind,
                        reference.id,
                        reference.stored_path
                    );
                    self.resolver
                        .resolve_exhaustive(&reference.query)
                        .ok()
                        .and_then(|resolved| self.resolver.relative(&resolved.path))
                }
            };

            details.push(PathDiagnosis {
                id: reference.id.to_string(),
                kind: reference.kind,
                file_name: reference.file_name,
                stored_path: reference.stored_path,
                exists: found.is_some(),
                resolved_path: found.map(|p| p.display().to_string()),
                suggested_fix,
            });
        }

        let working = details.iter().filter(|d| d.exists).count();
        Ok(DiagnoseReport {
            total: details.len(),
            working,
            broken: details.len() - working,
            details,
        })
    }

    /// Overwrites stored paths. Each fix succeeds or fails on its own.
    pub fn apply_fixes(&self, fixes: &[PathFix]) -> CatalogResult<FixPathsReport> {
        let mut details = Vec::with_capacity(fixes.len());
        for fix in fixes {
            let id = fix.id.clone().unwrap_or_default();
            let outcome = match self.apply_fix(fix) {
                Ok(new_path) => {
                    tracing::info!("fixed stored path of {} to {}", id, new_path);
                    FixOutcome {
                        id,
                        success: true,
                        message: format!("path updated to {}", new_path),
                    }
                }
                Err(e) => {
                    tracing::warn!("could not fix stored path of {:?}: {}", id, e);
                    FixOutcome {
                        id,
                        success: false,
                        message: e.to_string(),
                    }
                }
            };
            details.push(outcome);
        }

        let successful = details.iter().filter(|d| d.success).count();
        Ok(FixPathsReport {
            attempted: details.len(),
            successful,
            failed: details.len() - successful,
            details,
        })
    }

    fn apply_fix(&self, fix: &PathFix) -> CatalogResult<String> {
        let (Some(id), Some(new_path)) = (fix.id.as_deref(), fix.new_path.as_deref()) else {
            return Err(CatalogError::InvalidInput("id and newPath are required".into()));
        };
        let id = crate::parse_id(id)?;
        let new_path = normalize_stored_path(new_path);
        if !is_safe_relative(&new_path) {
            return Err(CatalogError::InvalidInput(format!(
                "'{}' is not a path inside the storage root",
                new_path
            )));
        }

        if let Some(mut paper) = self.store.get_question_paper(&id)? {
            paper.file_path = new_path.clone();
            self.store.update_question_paper(&paper)?;
            return Ok(new_path);
        }
        match self.store.get_resource(&id)? {
            Some(mut resource) if resource.resource_type.is_file_backed() => {
                resource.file_url = new_path.clone();
                resource.updated_at = Utc::now();
                self.store.update_resource(&resource)?;
                Ok(new_path)
            }
            _ => Err(CatalogError::NotFound(format!("record {}", id))),
        }
    }

    /// Strips one leading `/` or `\` from every stored path that has one.
    ///
    /// Nothing else about the path changes. A record that cannot be rewritten is reported as
    /// failed and the pass moves on.
    pub fn normalize(&self) -> CatalogResult<NormalizeReport> {
        let mut results = Vec::new();

        for mut paper in self
            .store
            .find_question_papers(&QuestionPaperFilter::default())?
        {
            let original = paper.file_path.clone();
            let outcome = match strip_leading_separator(&original).map(str::to_owned) {
                Some(stripped) => {
                    paper.file_path = stripped.clone();
                    let written = self.store.update_question_paper(&paper);
                    normalize_outcome(&paper.id, original, Some((stripped, written)))
                }
                None => normalize_outcome(&paper.id, original, None),
            };
            results.push(outcome);
        }

        for mut resource in self
            .store
            .find_resources(&ResourceFilter::default())?
            .into_iter()
            .filter(ResourceRecord::has_file)
        {
            let original = resource.file_url.clone();
            let outcome = match strip_leading_separator(&original).map(str::to_owned) {
                Some(stripped) => {
                    resource.file_url = stripped.clone();
                    let written = self.store.update_resource(&resource);
                    normalize_outcome(&resource.id, original, Some((stripped, written)))
                }
                None => normalize_outcome(&resource.id, original, None),
            };
            results.push(outcome);
        }

        let count = |status: NormalizeStatus| results.iter().filter(|r| r.status == status).count();
        let fixed = count(NormalizeStatus::Fixed);
        let unchanged = count(NormalizeStatus::Unchanged);
        let failed = count(NormalizeStatus::Failed);
        tracing::info!(
            "normalized {} of {} stored paths ({} failed)",
            fixed,
            results.len(),
            failed
        );
        Ok(NormalizeReport {
            total: results.len(),
            fixed,
            unchanged,
            failed,
            results,
        })
    }

    /// Lists resource records whose (semester, subject) has no subject record.
    ///
    /// With `apply`, each orphan is deleted and its file unlinked; a failed unlink is logged only.
    pub fn reconcile(&self, apply: bool) -> CatalogResult<ReconcileReport> {
        let subjects: BTreeSet<(String, String)> = self
            .store
            .all_subjects()?
            .into_iter()
            .map(|s| (s.semester, s.name))
            .collect();

        let mut details = Vec::new();
        for record in self.store.find_resources(&ResourceFilter::default())? {
            if subjects.contains(&(record.semester.clone(), record.subject.clone())) {
                continue;
            }

            let (record_removed, file_removed) = if apply {
                match self.store.delete_resource(&record.id) {
                    Ok(removed) => {
                        let file_removed = removed.is_some()
                            && record.has_file()
                            && self.ingestor.remove_superseded(&record.file_url);
                        (removed.is_some(), file_removed)
                    }
                    Err(e) => {
                        tracing::warn!("could not delete orphaned record {}: {}", record.id, e);
                        (false, false)
                    }
                }
            } else {
                (false, false)
            };

            details.push(OrphanOutcome {
                id: record.id.to_string(),
                semester: record.semester,
                subject: record.subject,
                resource_type: record.resource_type,
                file_url: record.file_url,
                record_removed,
                file_removed,
            });
        }

        let removed = details.iter().filter(|d| d.record_removed).count();
        if apply {
            tracing::info!("reconcile removed {} of {} orphaned records", removed, details.len());
        }
        Ok(ReconcileReport {
            applied: apply,
            orphans: details.len(),
            removed,
            details,
        })
    }
}

/// Alternate locations for a stored path, in order:
///
/// 1. the path as given, when it is absolute
/// 2. the path relative to the storage root's parent (paths stored as `uploads/...`)
/// 3. the path with a leading `uploads/` segment removed, relative to the storage root
fn alternate_candidates(root: &Path, stored_path: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let as_given = Path::new(stored_path.trim());
    if as_given.is_absolute() {
        candidates.push(as_given.to_path_buf());
    }

    let normalized = normalize_stored_path(stored_path);
    if !is_safe_relative(&normalized) {
        return candidates;
    }
    if let Some(parent) = root.parent() {
        candidates.push(parent.join(to_relative_path(&normalized)));
    }
    let legacy_prefix = format!("{}/", LEGACY_UPLOADS_SEGMENT);
    if let Some(rest) = normalized.strip_prefix(&legacy_prefix) {
        candidates.push(root.join(to_relative_path(rest)));
    }
    candidates
}

fn to_relative_path(path: &str) -> PathBuf {
    path.split('/').collect()
}

fn strip_leading_separator(path: &str) -> Option<&str> {
    path.strip_prefix('/').or_else(|| path.strip_prefix('\\'))
}

fn normalize_outcome(
    id: &CatalogId,
    original: String,
    rewrite: Option<(String, CatalogResult<()>)>,
) -> NormalizeOutcome {
    let (fixed, status, message) = match rewrite {
        None => (None, NormalizeStatus::Unchanged, None),
        Some((stripped, Ok(()))) => (Some(stripped), NormalizeStatus::Fixed, None),
        Some((_, Err(e))) => {
            tracing::warn!("could not normalize stored path of {}: {}", id, e);
            (None, NormalizeStatus::Failed, Some(e.to_string()))
        }
    };
    NormalizeOutcome {
        id: id.to_string(),
        original,
        fixed,
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileCatalogStore;
    use crate::constants::{RECORD_FILENAME, RESOURCES_COLLECTION};
    use crate::models::{FileResourceInput, IncomingFile, QuestionPaperInput};
    use crate::question_papers::QuestionPaperService;
    use crate::resources::ResourceService;
    use api_shared::wire::QuestionPaperUploadRes;
    use portal_types::ResourceType;
    use std::fs;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\nrepair\n";

    struct Fixture {
        _temp_dir: TempDir,
        storage: PathBuf,
        store: Arc<FileCatalogStore>,
        resources: ResourceService,
        papers: QuestionPaperService,
        repair: RepairService,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("uploads");
        let catalog = temp_dir.path().join("catalog");
        fs::create_dir_all(&storage).unwrap();
        let storage = storage.canonicalize().unwrap();
        let store = Arc::new(FileCatalogStore::open(&catalog).unwrap());
        let cfg = Arc::new(CoreConfig::new(storage.clone(), catalog).unwrap());
        Fixture {
            resources: ResourceService::new(cfg.clone(), store.clone()).unwrap(),
            papers: QuestionPaperService::new(cfg.clone(), store.clone()).unwrap(),
            repair: RepairService::new(cfg, store.clone()).unwrap(),
            _temp_dir: temp_dir,
            storage,
            store,
        }
    }

    fn pdf() -> IncomingFile<&'static [u8]> {
        IncomingFile {
            original_name: "paper.pdf".into(),
            content_type: "application/pdf".into(),
            body: PDF,
        }
    }

    fn upload_paper(f: &Fixture, subject: &str, exam_type: &str) -> QuestionPaperUploadRes {
        f.papers
            .upload(
                &QuestionPaperInput {
                    year: "2023".into(),
                    semester: 5,
                    subject: subject.into(),
                    exam_type: exam_type.into(),
                    uploaded_by: "admin".into(),
                },
                pdf(),
            )
            .unwrap()
    }

    fn set_paper_path(f: &Fixture, id: &str, path: &str) {
        let id = CatalogId::parse(id).unwrap();
        let mut paper = f.store.get_question_paper(&id).unwrap().unwrap();
        paper.file_path = path.into();
        f.store.update_question_paper(&paper).unwrap();
    }

    fn catalog_snapshot(f: &Fixture) -> Vec<String> {
        let papers = f
            .store
            .find_question_papers(&QuestionPaperFilter::default())
            .unwrap();
        papers.into_iter().map(|p| p.file_path).collect()
    }

    #[test]
    fn diagnose_classifies_and_never_mutates() {
        let f = fixture();
        upload_paper(&f, "OS", "Mid");
        let moved = upload_paper(&f, "DBMS", "End");

        // Move the second paper somewhere the fast tiers cannot see.
        let elsewhere = f.storage.join("archive");
        fs::create_dir_all(&elsewhere).unwrap();
        let file_name = Path::new(&moved.file_path).file_name().unwrap();
        fs::rename(f.storage.join(&moved.file_path), elsewhere.join(file_name)).unwrap();

        let before = catalog_snapshot(&f);
        let first = f.repair.diagnose().unwrap();
        let second = f.repair.diagnose().unwrap();
        assert_eq!(first, second);
        assert_eq!(catalog_snapshot(&f), before);

        assert_eq!(first.total, 2);
        assert_eq!(first.working, 1);
        assert_eq!(first.broken, 1);
        let broken = first.details.iter().find(|d| !d.exists).unwrap();
        assert_eq!(broken.id, moved.id);
        assert_eq!(
            broken.suggested_fix.as_deref(),
            Some(format!("archive/{}", file_name.to_string_lossy()).as_str())
        );
    }

    #[test]
    fn diagnose_accepts_legacy_uploads_prefix() {
        let f = fixture();
        let paper = upload_paper(&f, "OS", "Mid");
        set_paper_path(&f, &paper.id, &format!("/uploads/{}", paper.file_path));

        // The canonical tier misses; the structural tier still finds it.
        let report = f.repair.diagnose().unwrap();
        assert_eq!(report.working, 1);

        fs::rename(
            f.storage.join("question-papers"),
            f.storage.join("question-papers-old"),
        )
        .unwrap();
        let report = f.repair.diagnose().unwrap();
        assert_eq!(report.broken, 1);
        assert_eq!(
            report.details[0].suggested_fix.as_deref().map(|p| p.starts_with("question-papers-old/")),
            Some(true)
        );
    }

    #[test]
    fn alternate_candidates_cover_legacy_layouts() {
        let root = Path::new("/srv/portal/uploads");
        let candidates = alternate_candidates(root, "/uploads/question-papers/2023/5/a.pdf");
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/uploads/question-papers/2023/5/a.pdf"),
                PathBuf::from("/srv/portal/uploads/question-papers/2023/5/a.pdf"),
                PathBuf::from("/srv/portal/uploads/question-papers/2023/5/a.pdf"),
            ]
        );
        assert!(alternate_candidates(root, "../../etc/passwd").is_empty());
    }

    #[test]
    fn apply_fixes_reports_per_item() {
        let f = fixture();
        let a = upload_paper(&f, "OS", "Mid");
        let b = upload_paper(&f, "OS", "End");

        let fixes = vec![
            PathFix {
                id: Some(a.id.clone()),
                new_path: Some("question-papers/2023/5/fixed-a.pdf".into()),
            },
            PathFix {
                id: Some(CatalogId::new().to_string()),
                new_path: Some("question-papers/x.pdf".into()),
            },
            PathFix {
                id: Some(b.id.clone()),
                new_path: Some("/question-papers/2023/5/fixed-b.pdf".into()),
            },
        ];
        let report = f.repair.apply_fixes(&fixes).unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.successful, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.details[1].success);

        let paths = catalog_snapshot(&f);
        assert!(paths.contains(&"question-papers/2023/5/fixed-a.pdf".to_owned()));
        assert!(paths.contains(&"question-papers/2023/5/fixed-b.pdf".to_owned()));
    }

    #[test]
    fn apply_fixes_rejects_incomplete_and_escaping_items() {
        let f = fixture();
        let a = upload_paper(&f, "OS", "Mid");
        let fixes = vec![
            PathFix {
                id: Some(a.id.clone()),
                new_path: None,
            },
            PathFix {
                id: Some(a.id.clone()),
                new_path: Some("../../etc/passwd".into()),
            },
        ];
        let report = f.repair.apply_fixes(&fixes).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(catalog_snapshot(&f), vec![a.file_path]);
    }

    #[test]
    fn normalize_strips_leading_separator_only() {
        let f = fixture();
        let a = upload_paper(&f, "OS", "Mid");
        let b = upload_paper(&f, "OS", "End");
        set_paper_path(&f, &a.id, &format!("/{}", a.file_path));
        let notes = f
            .resources
            .upload_file(
                &FileResourceInput {
                    semester: "3".into(),
                    subject: "DS".into(),
                    resource_type: ResourceType::Notes,
                },
                pdf(),
            )
            .unwrap();

        let report = f.repair.normalize().unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.unchanged, 2);
        assert_eq!(report.failed, 0);
        let fixed = report
            .results
            .iter()
            .find(|r| r.status == NormalizeStatus::Fixed)
            .unwrap();
        assert_eq!(fixed.id, a.id);
        assert_eq!(fixed.fixed.as_deref(), Some(a.file_path.as_str()));

        let mut paths = catalog_snapshot(&f);
        paths.sort();
        let mut expected = vec![a.file_path, b.file_path];
        expected.sort();
        assert_eq!(paths, expected);
        assert!(f.storage.join(&notes.file_url).is_file());

        let again = f.repair.normalize().unwrap();
        assert_eq!(again.fixed, 0);
    }

    #[test]
    fn normalize_reports_records_it_cannot_rewrite() {
        let f = fixture();
        let paper = upload_paper(&f, "OS", "Mid");
        set_paper_path(&f, &paper.id, &format!("/{}", paper.file_path));
        let notes = f
            .resources
            .upload_file(
                &FileResourceInput {
                    semester: "3".into(),
                    subject: "DS".into(),
                    resource_type: ResourceType::Notes,
                },
                pdf(),
            )
            .unwrap();
        let id = CatalogId::parse(&notes.id).unwrap();
        let mut first = f.store.get_resource(&id).unwrap().unwrap();
        first.file_url = format!("/{}", first.file_url);
        f.store.update_resource(&first).unwrap();

        // A second record on the same key, written behind the store's back.
        let mut twin = first.clone();
        twin.id = CatalogId::new();
        twin.file_url = "/resources/sem3/notes/b.pdf".into();
        let twin_path = twin
            .id
            .sharded_dir(&f._temp_dir.path().join("catalog").join(RESOURCES_COLLECTION))
            .join(RECORD_FILENAME);
        fs::create_dir_all(twin_path.parent().unwrap()).unwrap();
        fs::write(&twin_path, serde_yaml::to_string(&twin).unwrap()).unwrap();

        let report = f.repair.normalize().unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.unchanged, 0);
        for outcome in report
            .results
            .iter()
            .filter(|r| r.status == NormalizeStatus::Failed)
        {
            assert!(outcome.fixed.is_none());
            assert!(outcome.message.as_deref().unwrap().contains("key"));
        }

        assert_eq!(catalog_snapshot(&f), vec![paper.file_path]);
        let unchanged = f.store.get_resource(&id).unwrap().unwrap();
        assert_eq!(unchanged.file_url, first.file_url);
    }

    #[test]
    fn reconcile_removes_orphans_when_applied() {
        let f = fixture();
        let kept = f
            .resources
            .upload_file(
                &FileResourceInput {
                    semester: "3".into(),
                    subject: "Algorithms".into(),
                    resource_type: ResourceType::Notes,
                },
                pdf(),
            )
            .unwrap();
        let orphan = f
            .resources
            .upload_file(
                &FileResourceInput {
                    semester: "3".into(),
                    subject: "Data Structures".into(),
                    resource_type: ResourceType::Books,
                },
                pdf(),
            )
            .unwrap();
        // Simulate a subject delete interrupted after the subject record went away.
        assert!(f.store.delete_subject("3", "Data Structures").unwrap());

        let dry_run = f.repair.reconcile(false).unwrap();
        assert_eq!(dry_run.orphans, 1);
        assert_eq!(dry_run.removed, 0);
        assert!(f.storage.join(&orphan.file_url).is_file());

        let applied = f.repair.reconcile(true).unwrap();
        assert_eq!(applied.removed, 1);
        assert!(applied.details[0].file_removed);
        assert!(!f.storage.join(&orphan.file_url).exists());
        assert!(f.storage.join(&kept.file_url).is_file());

        assert_eq!(f.repair.reconcile(true).unwrap().orphans, 0);
        assert!(f.store.find_subject("3", "Algorithms").unwrap().is_some());
    }
}
