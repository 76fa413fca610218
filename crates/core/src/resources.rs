//! Notes, books and video materials.
//!
//! Uploads follow a fixed order: the file is written first, then the catalog record is upserted,
//! and only then is the file the record used to reference unlinked. A crash in between leaves at
//! worst an orphan file or a dangling reference, both of which the resolver and the repair tool
//! tolerate.

use crate::catalog::CatalogStore;
use crate::config::CoreConfig;
use crate::models::{
    FileResourceInput, IncomingFile, ResourceFilter, ResourceRecord, SubjectRecord,
    VideoChannelInput,
};
use crate::{CatalogError, CatalogResult};
use api_shared::wire::{
    FileEntry, ResourceUploadRes, SemesterOverview, SubjectDeleteRes, TypeEntries, TypeListing,
    VideoChannel,
};
use chrono::Utc;
use portal_files::{Ingestor, UploadTarget};
use portal_types::{NonEmptyText, ResourceType};
use portal_uuid::CatalogId;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

/// Use cases over resource and subject records.
#[derive(Debug, Clone)]
pub struct ResourceService {
    store: Arc<dyn CatalogStore>,
    ingestor: Ingestor,
}

fn required(field: &str, value: &str) -> CatalogResult<String> {
    NonEmptyText::new(value)
        .map(NonEmptyText::into_inner)
        .map_err(|_| CatalogError::InvalidInput(format!("{} is required", field)))
}

impl ResourceService {
    /// Creates the service over an existing storage root.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Files` if the storage root is unusable.
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CatalogStore>) -> CatalogResult<Self> {
        let ingestor = Ingestor::new(cfg.storage_root())?;
        Ok(Self { store, ingestor })
    }

    /// Stores a notes/books file and points the catalog at it.
    ///
    /// The subject is created if the semester does not have it yet. When a record already
    /// existed for the key it is updated in place and its previous file is unlinked.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for blank metadata
    /// - `Files` for media type, size and write failures; nothing is written in the first two
    ///   cases
    /// - store errors from the upsert; the new file is removed again in that case
    pub fn upload_file<R: Read>(
        &self,
        input: &FileResourceInput,
        file: IncomingFile<R>,
    ) -> CatalogResult<ResourceUploadRes> {
        let semester = required("semester", &input.semester)?;
        let subject = required("subject", &input.subject)?;
        let target = UploadTarget::resource(&semester, input.resource_type, &subject)?;

        let stored = self.ingestor.ingest(
            &target,
            &file.original_name,
            &file.content_type,
            file.body,
        )?;

        let record = ResourceRecord {
            id: CatalogId::new(),
            semester: semester.clone(),
            resource_type: input.resource_type,
            subject: subject.clone(),
            file_url: stored.relative_path.to_string(),
            file_name: stored.original_name.clone(),
            channel: String::new(),
            topics: Vec::new(),
            updated_at: Utc::now(),
        };

        let upserted = self
            .ensure_subject(&semester, &subject)
            .and_then(|()| self.store.upsert_file_resource(record));
        let upserted = match upserted {
            Ok(upserted) => upserted,
            Err(e) => {
                self.ingestor.remove_superseded(stored.relative_path.as_str());
                return Err(e);
            }
        };

        if let Some(previous) = &upserted.previous {
            if previous.has_file() && previous.file_url != upserted.record.file_url {
                self.ingestor.remove_superseded(&previous.file_url);
            }
        }

        let replaced = upserted.previous.is_some();
        tracing::info!(
            "{} {} for {} in semester {}",
            if replaced { "replaced" } else { "added" },
            input.resource_type,
            subject,
            semester
        );
        Ok(ResourceUploadRes {
            message: if replaced {
                "Resource updated successfully".into()
            } else {
                "Resource added successfully".into()
            },
            id: upserted.record.id.to_string(),
            semester,
            subject,
            resource_type: input.resource_type,
            file_url: upserted.record.file_url,
            file_name: upserted.record.file_name,
            replaced,
        })
    }

    /// Records a video channel for a subject.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank fields or an empty topic list, `Conflict` when the channel is
    /// already recorded for the subject.
    pub fn add_video_channel(&self, input: &VideoChannelInput) -> CatalogResult<ResourceUploadRes> {
        let semester = required("semester", &input.semester)?;
        let subject = required("subject", &input.subject)?;
        let channel = required("channel", &input.channel)?;
        let topics: Vec<String> = input
            .topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        if topics.is_empty() {
            return Err(CatalogError::InvalidInput("topics are required".into()));
        }

        self.ensure_subject(&semester, &subject)?;
        let record = self.store.insert_resource(ResourceRecord {
            id: CatalogId::new(),
            semester: semester.clone(),
            resource_type: ResourceType::VideoMaterials,
            subject: subject.clone(),
            file_url: String::new(),
            file_name: String::new(),
            channel: channel.clone(),
            topics,
            updated_at: Utc::now(),
        })?;

        tracing::info!("added channel {} for {} in semester {}", channel, subject, semester);
        Ok(ResourceUploadRes {
            message: "Channel added successfully".into(),
            id: record.id.to_string(),
            semester,
            subject,
            resource_type: ResourceType::VideoMaterials,
            file_url: String::new(),
            file_name: String::new(),
            replaced: false,
        })
    }

    /// Removes a video channel.
    ///
    /// # Errors
    ///
    /// `NotFound` when the channel is not recorded.
    pub fn delete_video_channel(
        &self,
        semester: &str,
        subject: &str,
        channel: &str,
    ) -> CatalogResult<()> {
        let filter = ResourceFilter::subject(semester.trim(), subject.trim())
            .with_type(ResourceType::VideoMaterials)
            .with_channel(channel.trim());
        let removed = self.store.delete_resources(&filter)?;
        if removed.is_empty() {
            return Err(CatalogError::NotFound(format!(
                "channel '{}' for {} in semester {}",
                channel, subject, semester
            )));
        }
        tracing::info!("deleted channel {} for {} in semester {}", channel, subject, semester);
        Ok(())
    }

    /// Deletes a notes/books record, then its file. A failed unlink is logged only.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for video materials, `NotFound` when no record exists.
    pub fn delete_file_resource(
        &self,
        semester: &str,
        subject: &str,
        resource_type: ResourceType,
    ) -> CatalogResult<()> {
        if !resource_type.is_file_backed() {
            return Err(CatalogError::InvalidInput(format!(
                "{} are deleted per channel",
                resource_type
            )));
        }
        let filter = ResourceFilter::subject(semester.trim(), subject.trim()).with_type(resource_type);
        let removed = self.store.delete_resources(&filter)?;
        if removed.is_empty() {
            return Err(CatalogError::NotFound(format!(
                "{} for {} in semester {}",
                resource_type, subject, semester
            )));
        }
        for record in removed.iter().filter(|r| r.has_file()) {
            self.ingestor.remove_superseded(&record.file_url);
        }
        tracing::info!("deleted {} for {} in semester {}", resource_type, subject, semester);
        Ok(())
    }

    /// Subjects of a semester with their notes, books and channels.
    ///
    /// Every listed subject appears in each map: `""` for a missing file, `[]` for no channels.
    pub fn semester_overview(&self, semester: &str) -> CatalogResult<SemesterOverview> {
        let semester = semester.trim();
        let subjects: Vec<String> = self
            .store
            .list_subjects(semester)?
            .into_iter()
            .map(|s| s.name)
            .collect();
        let resources = self.store.find_resources(&ResourceFilter::semester(semester))?;

        let mut notes = BTreeMap::new();
        let mut books = BTreeMap::new();
        let mut video_materials = BTreeMap::new();
        for subject in &subjects {
            let of_subject = || resources.iter().filter(move |r| &r.subject == subject);
            let file_of = |kind: ResourceType| {
                of_subject()
                    .find(|r| r.resource_type == kind)
                    .map(|r| r.file_url.clone())
                    .unwrap_or_default()
            };
            notes.insert(subject.clone(), file_of(ResourceType::Notes));
            books.insert(subject.clone(), file_of(ResourceType::Books));
            video_materials.insert(
                subject.clone(),
                of_subject()
                    .filter(|r| r.resource_type == ResourceType::VideoMaterials)
                    .map(channel_of)
                    .collect(),
            );
        }

        Ok(SemesterOverview {
            semester: semester.to_owned(),
            subjects,
            notes,
            books,
            video_materials,
        })
    }

    /// Resources of one type in a semester, keyed by subject.
    pub fn list_by_type(
        &self,
        semester: &str,
        resource_type: ResourceType,
    ) -> CatalogResult<TypeListing> {
        let semester = semester.trim();
        let records = self
            .store
            .find_resources(&ResourceFilter::semester(semester).with_type(resource_type))?;

        let resources = if resource_type.is_file_backed() {
            TypeEntries::Files(
                records
                    .into_iter()
                    .map(|r| {
                        let entry = FileEntry {
                            id: r.id.to_string(),
                            url: r.file_url,
                            name: r.file_name,
                        };
                        (r.subject, entry)
                    })
                    .collect(),
            )
        } else {
            let mut by_subject: BTreeMap<String, Vec<VideoChannel>> = BTreeMap::new();
            for record in &records {
                by_subject
                    .entry(record.subject.clone())
                    .or_default()
                    .push(channel_of(record));
            }
            TypeEntries::Videos(by_subject)
        };

        Ok(TypeListing {
            semester: semester.to_owned(),
            resource_type,
            resources,
        })
    }

    /// Subject names of a semester, sorted.
    pub fn subject_names(&self, semester: &str) -> CatalogResult<Vec<String>> {
        Ok(self
            .store
            .list_subjects(semester.trim())?
            .into_iter()
            .map(|s| s.name)
            .collect())
    }

    /// # Errors
    ///
    /// `InvalidInput` for blank fields, `Conflict` when the subject exists.
    pub fn add_subject(&self, semester: &str, name: &str) -> CatalogResult<SubjectRecord> {
        let record = self.store.insert_subject(SubjectRecord {
            id: CatalogId::new(),
            semester: required("semester", semester)?,
            name: required("name", name)?,
        })?;
        tracing::info!("added subject {} to semester {}", record.name, record.semester);
        Ok(record)
    }

    /// Deletes a subject, then every resource record filed under it, then their files.
    ///
    /// Re-running the delete for a subject that is already gone still removes any remaining
    /// resource records and reports success.
    pub fn delete_subject(&self, semester: &str, name: &str) -> CatalogResult<SubjectDeleteRes> {
        let semester = required("semester", semester)?;
        let name = required("name", name)?;

        let subject_removed = self.store.delete_subject(&semester, &name)?;
        let removed = self
            .store
            .delete_resources(&ResourceFilter::subject(&semester, &name))?;
        let files_removed = removed
            .iter()
            .filter(|r| r.has_file())
            .filter(|r| self.ingestor.remove_superseded(&r.file_url))
            .count();

        tracing::info!(
            "deleted subject {} from semester {} ({} resources, {} files)",
            name,
            semester,
            removed.len(),
            files_removed
        );
        Ok(SubjectDeleteRes {
            message: "Subject deleted successfully".into(),
            subject_removed,
            resources_removed: removed.len(),
            files_removed,
        })
    }

    fn ensure_subject(&self, semester: &str, subject: &str) -> CatalogResult<()> {
        if self.store.find_subject(semester, subject)?.is_some() {
            return Ok(());
        }
        let created = self.store.insert_subject(SubjectRecord {
            id: CatalogId::new(),
            semester: semester.to_owned(),
            name: subject.to_owned(),
        });
        match created {
            Ok(record) => {
                tracing::info!("created subject {} in semester {}", record.name, record.semester);
                Ok(())
            }
            // A concurrent upload created it first.
            Err(CatalogError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn channel_of(record: &ResourceRecord) -> VideoChannel {
    VideoChannel {
        channel: record.channel.clone(),
        topics: record.topics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileCatalogStore;
    use portal_files::FilesError;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n%test\n";

    struct Fixture {
        _temp_dir: TempDir,
        storage: PathBuf,
        store: Arc<FileCatalogStore>,
        service: ResourceService,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("uploads");
        let catalog = temp_dir.path().join("catalog");
        std::fs::create_dir_all(&storage).unwrap();
        std::fs::create_dir_all(&catalog).unwrap();
        let storage = storage.canonicalize().unwrap();
        let cfg = Arc::new(CoreConfig::new(storage.clone(), catalog.clone()).unwrap());
        let store = Arc::new(FileCatalogStore::open(&catalog).unwrap());
        let service = ResourceService::new(cfg, store.clone()).unwrap();
        Fixture {
            _temp_dir: temp_dir,
            storage,
            store,
            service,
        }
    }

    fn pdf(name: &str) -> IncomingFile<&'static [u8]> {
        IncomingFile {
            original_name: name.into(),
            content_type: "application/pdf".into(),
            body: PDF,
        }
    }

    fn notes_input(semester: &str, subject: &str) -> FileResourceInput {
        FileResourceInput {
            semester: semester.into(),
            subject: subject.into(),
            resource_type: ResourceType::Notes,
        }
    }

    fn exists(storage: &Path, relative: &str) -> bool {
        storage.join(relative).is_file()
    }

    #[test]
    fn reupload_keeps_one_record_and_removes_old_file() {
        let f = fixture();
        let input = notes_input("3", "Data Structures");

        let first = f.service.upload_file(&input, pdf("ds-v1.pdf")).unwrap();
        assert!(!first.replaced);
        assert!(exists(&f.storage, &first.file_url));

        let second = f.service.upload_file(&input, pdf("ds-v2.pdf")).unwrap();
        assert!(second.replaced);
        assert_eq!(second.id, first.id);
        assert_ne!(second.file_url, first.file_url);
        assert!(exists(&f.storage, &second.file_url));
        assert!(!exists(&f.storage, &first.file_url));

        let records = f
            .store
            .find_resources(&ResourceFilter::subject("3", "Data Structures").with_type(ResourceType::Notes))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "ds-v2.pdf");
    }

    #[test]
    fn upload_creates_missing_subject() {
        let f = fixture();
        f.service
            .upload_file(&notes_input("2", "Physics"), pdf("p.pdf"))
            .unwrap();
        assert_eq!(f.service.subject_names("2").unwrap(), vec!["Physics"]);
    }

    #[test]
    fn rejected_upload_writes_nothing() {
        let f = fixture();
        let result = f.service.upload_file(
            &notes_input("2", "Physics"),
            IncomingFile {
                original_name: "p.txt".into(),
                content_type: "text/plain".into(),
                body: &b"hello"[..],
            },
        );
        assert!(matches!(
            result,
            Err(CatalogError::Files(FilesError::UnsupportedMediaType(_)))
        ));
        assert!(f.service.subject_names("2").unwrap().is_empty());
        assert_eq!(std::fs::read_dir(&f.storage).unwrap().count(), 0);
    }

    #[test]
    fn blank_metadata_is_rejected() {
        let f = fixture();
        assert!(matches!(
            f.service.upload_file(&notes_input(" ", "Physics"), pdf("p.pdf")),
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[test]
    fn video_channels_are_unique_per_subject() {
        let f = fixture();
        let input = VideoChannelInput {
            semester: "3".into(),
            subject: "Data Structures".into(),
            channel: "NPTEL".into(),
            topics: VideoChannelInput::split_topics("Trees, Graphs"),
        };
        f.service.add_video_channel(&input).unwrap();
        assert!(matches!(
            f.service.add_video_channel(&input),
            Err(CatalogError::Conflict(_))
        ));

        let other = VideoChannelInput {
            channel: "MIT OCW".into(),
            ..input.clone()
        };
        f.service.add_video_channel(&other).unwrap();

        let listing = f
            .service
            .list_by_type("3", ResourceType::VideoMaterials)
            .unwrap();
        match listing.resources {
            TypeEntries::Videos(map) => assert_eq!(map["Data Structures"].len(), 2),
            other => panic!("expected videos, got {:?}", other),
        }

        f.service
            .delete_video_channel("3", "Data Structures", "NPTEL")
            .unwrap();
        assert!(matches!(
            f.service.delete_video_channel("3", "Data Structures", "NPTEL"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn overview_fills_defaults_for_every_subject() {
        let f = fixture();
        f.service.add_subject("3", "Algorithms").unwrap();
        let uploaded = f
            .service
            .upload_file(&notes_input("3", "Data Structures"), pdf("ds.pdf"))
            .unwrap();

        let overview = f.service.semester_overview("3").unwrap();
        assert_eq!(overview.subjects, vec!["Algorithms", "Data Structures"]);
        assert_eq!(overview.notes["Data Structures"], uploaded.file_url);
        assert_eq!(overview.notes["Algorithms"], "");
        assert_eq!(overview.books["Data Structures"], "");
        assert!(overview.video_materials["Algorithms"].is_empty());
    }

    #[test]
    fn by_type_lists_files_with_ids() {
        let f = fixture();
        let uploaded = f
            .service
            .upload_file(&notes_input("3", "Data Structures"), pdf("ds.pdf"))
            .unwrap();
        let listing = f.service.list_by_type("3", ResourceType::Notes).unwrap();
        match listing.resources {
            TypeEntries::Files(map) => {
                let entry = &map["Data Structures"];
                assert_eq!(entry.id, uploaded.id);
                assert_eq!(entry.name, "ds.pdf");
            }
            other => panic!("expected files, got {:?}", other),
        }
    }

    #[test]
    fn delete_file_resource_removes_record_then_file() {
        let f = fixture();
        let uploaded = f
            .service
            .upload_file(&notes_input("3", "Data Structures"), pdf("ds.pdf"))
            .unwrap();

        f.service
            .delete_file_resource("3", "Data Structures", ResourceType::Notes)
            .unwrap();
        assert!(!exists(&f.storage, &uploaded.file_url));
        assert!(matches!(
            f.service
                .delete_file_resource("3", "Data Structures", ResourceType::Notes),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            f.service
                .delete_file_resource("3", "Data Structures", ResourceType::VideoMaterials),
            Err(CatalogError::InvalidInput(_))
        ));
    }

    #[test]
    fn subject_delete_cascades_and_is_rerunnable() {
        let f = fixture();
        let notes = f
            .service
            .upload_file(&notes_input("3", "Data Structures"), pdf("ds.pdf"))
            .unwrap();
        f.service
            .upload_file(
                &FileResourceInput {
                    resource_type: ResourceType::Books,
                    ..notes_input("3", "Data Structures")
                },
                pdf("book.pdf"),
            )
            .unwrap();

        let first = f.service.delete_subject("3", "Data Structures").unwrap();
        assert!(first.subject_removed);
        assert_eq!(first.resources_removed, 2);
        assert_eq!(first.files_removed, 2);
        assert!(!exists(&f.storage, &notes.file_url));

        // An interrupted earlier delete can leave records behind without their subject.
        f.store
            .insert_resource(ResourceRecord {
                id: CatalogId::new(),
                semester: "3".into(),
                resource_type: ResourceType::Notes,
                subject: "Data Structures".into(),
                file_url: String::new(),
                file_name: String::new(),
                channel: String::new(),
                topics: vec![],
                updated_at: Utc::now(),
            })
            .unwrap();

        let second = f.service.delete_subject("3", "Data Structures").unwrap();
        assert!(!second.subject_removed);
        assert_eq!(second.resources_removed, 1);

        let overview = f.service.semester_overview("3").unwrap();
        assert!(overview.subjects.is_empty());
        assert!(f
            .store
            .find_resources(&ResourceFilter::subject("3", "Data Structures"))
            .unwrap()
            .is_empty());
    }
}
