//! Catalog store
//!
//! The [`CatalogStore`] trait is the seam to the document store: CRUD over resource, subject and
//! question-paper records with the uniqueness invariants enforced at the store boundary.
//!
//! [`FileCatalogStore`] is the shipped implementation. It keeps one YAML document per record:
//!
//! ```text
//! <catalog_dir>/
//! ├── resources/<s1>/<s2>/<id>/record.yaml
//! ├── subjects/<s1>/<s2>/<id>/record.yaml
//! └── question-papers/<s1>/<s2>/<id>/record.yaml
//! ```
//!
//! Every operation holds the store's mutex, so check-then-write sequences are serialised within
//! a process. Writes go to a temporary file that is renamed over the record, so readers never see
//! a half-written document.

use crate::constants::{
    QUESTION_PAPERS_COLLECTION, RECORD_FILENAME, RESOURCES_COLLECTION, SUBJECTS_COLLECTION,
};
use crate::models::{
    QuestionPaperFilter, QuestionPaperRecord, ResourceFilter, ResourceRecord, SubjectRecord,
    Upserted,
};
use crate::{CatalogError, CatalogResult};
use portal_uuid::CatalogId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Persistence of catalog records.
pub trait CatalogStore: Send + Sync + std::fmt::Debug {
    fn find_resources(&self, filter: &ResourceFilter) -> CatalogResult<Vec<ResourceRecord>>;

    fn get_resource(&self, id: &CatalogId) -> CatalogResult<Option<ResourceRecord>>;

    /// Fails with [`CatalogError::Conflict`] if a record with the same key exists.
    fn insert_resource(&self, record: ResourceRecord) -> CatalogResult<ResourceRecord>;

    /// Replaces the notes/books record with the same key, keeping its id, or inserts.
    fn upsert_file_resource(
        &self,
        record: ResourceRecord,
    ) -> CatalogResult<Upserted<ResourceRecord>>;

    /// Fails with [`CatalogError::NotFound`] if no record has this id.
    fn update_resource(&self, record: &ResourceRecord) -> CatalogResult<()>;

    fn delete_resource(&self, id: &CatalogId) -> CatalogResult<Option<ResourceRecord>>;

    /// Deletes every matching record and returns them.
    fn delete_resources(&self, filter: &ResourceFilter) -> CatalogResult<Vec<ResourceRecord>>;

    /// Subjects of a semester sorted by name.
    fn list_subjects(&self, semester: &str) -> CatalogResult<Vec<SubjectRecord>>;

    fn find_subject(&self, semester: &str, name: &str) -> CatalogResult<Option<SubjectRecord>>;

    /// Fails with [`CatalogError::Conflict`] on a duplicate (semester, name).
    fn insert_subject(&self, record: SubjectRecord) -> CatalogResult<SubjectRecord>;

    /// Returns whether a record was removed.
    fn delete_subject(&self, semester: &str, name: &str) -> CatalogResult<bool>;

    fn all_subjects(&self) -> CatalogResult<Vec<SubjectRecord>>;

    fn find_question_papers(
        &self,
        filter: &QuestionPaperFilter,
    ) -> CatalogResult<Vec<QuestionPaperRecord>>;

    fn get_question_paper(&self, id: &CatalogId) -> CatalogResult<Option<QuestionPaperRecord>>;

    /// Replaces the record with the same key, keeping its id, or inserts.
    fn upsert_question_paper(
        &self,
        record: QuestionPaperRecord,
    ) -> CatalogResult<Upserted<QuestionPaperRecord>>;

    /// Fails with [`CatalogError::NotFound`] if no record has this id.
    fn update_question_paper(&self, record: &QuestionPaperRecord) -> CatalogResult<()>;

    fn delete_question_paper(&self, id: &CatalogId) -> CatalogResult<Option<QuestionPaperRecord>>;
}

/// A record type that lives in a catalog collection.
trait Collected: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    fn id(&self) -> &CatalogId;
}

impl Collected for ResourceRecord {
    const COLLECTION: &'static str = RESOURCES_COLLECTION;
    fn id(&self) -> &CatalogId {
        &self.id
    }
}

impl Collected for SubjectRecord {
    const COLLECTION: &'static str = SUBJECTS_COLLECTION;
    fn id(&self) -> &CatalogId {
        &self.id
    }
}

impl Collected for QuestionPaperRecord {
    const COLLECTION: &'static str = QUESTION_PAPERS_COLLECTION;
    fn id(&self) -> &CatalogId {
        &self.id
    }
}

/// YAML-per-record catalog beneath a directory.
#[derive(Debug)]
pub struct FileCatalogStore {
    catalog_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileCatalogStore {
    /// Creates a store rooted at `catalog_dir`, creating the directory if needed.
    pub fn open(catalog_dir: &Path) -> CatalogResult<Self> {
        fs::create_dir_all(catalog_dir).map_err(CatalogError::StorageDirCreation)?;
        Ok(Self {
            catalog_dir: catalog_dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The guarded state is `()`, so a poisoned lock carries no broken invariant.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collection_dir<T: Collected>(&self) -> PathBuf {
        self.catalog_dir.join(T::COLLECTION)
    }

    fn record_path<T: Collected>(&self, id: &CatalogId) -> PathBuf {
        id.sharded_dir(&self.collection_dir::<T>())
            .join(RECORD_FILENAME)
    }

    /// Loads every record of a collection. Unreadable or malformed records are skipped.
    fn load_all<T: Collected>(&self) -> CatalogResult<Vec<T>> {
        let collection = self.collection_dir::<T>();
        let mut records = Vec::new();

        let s1_iter = match fs::read_dir(&collection) {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(CatalogError::RecordRead(e)),
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }
            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }
                let id_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };
                for id_ent in id_iter.flatten() {
                    let record_path = id_ent.path().join(RECORD_FILENAME);
                    if !record_path.is_file() {
                        continue;
                    }
                    match read_record::<T>(&record_path) {
                        Ok(record) => records.push(record),
                        Err(e) => tracing::warn!(
                            "skipping unreadable catalog record {}: {}",
                            record_path.display(),
                            e
                        ),
                    }
                }
            }
        }
        Ok(records)
    }

    fn load<T: Collected>(&self, id: &CatalogId) -> CatalogResult<Option<T>> {
        let path = self.record_path::<T>(id);
        if !path.is_file() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    fn write<T: Collected>(&self, record: &T) -> CatalogResult<()> {
        let path = self.record_path::<T>(record.id());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(CatalogError::RecordWrite)?;
        }
        let yaml = serde_yaml::to_string(record).map_err(CatalogError::YamlSerialization)?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(CatalogError::RecordWrite)?;
        fs::rename(&tmp, &path).map_err(CatalogError::RecordWrite)
    }

    fn remove<T: Collected>(&self, id: &CatalogId) -> CatalogResult<()> {
        let record_dir = id.sharded_dir(&self.collection_dir::<T>());
        match fs::remove_dir_all(&record_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CatalogError::RecordDelete(e)),
        }
        // Prune shard directories left empty.
        let collection = self.collection_dir::<T>();
        let mut dir = record_dir.parent();
        while let Some(current) = dir {
            if current == collection || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> CatalogResult<T> {
    let contents = fs::read_to_string(path).map_err(CatalogError::RecordRead)?;
    serde_yaml::from_str(&contents).map_err(CatalogError::YamlDeserialization)
}

impl CatalogStore for FileCatalogStore {
    fn find_resources(&self, filter: &ResourceFilter) -> CatalogResult<Vec<ResourceRecord>> {
        let _guard = self.guard();
        let mut records: Vec<ResourceRecord> = self
            .load_all::<ResourceRecord>()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(|a, b| {
            (&a.semester, &a.subject, a.resource_type.as_str(), &a.channel)
                .cmp(&(&b.semester, &b.subject, b.resource_type.as_str(), &b.channel))
        });
        Ok(records)
    }

    fn get_resource(&self, id: &CatalogId) -> CatalogResult<Option<ResourceRecord>> {
        let _guard = self.guard();
        self.load(id)
    }

    fn insert_resource(&self, record: ResourceRecord) -> CatalogResult<ResourceRecord> {
        let _guard = self.guard();
        let existing = self.load_all::<ResourceRecord>()?;
        if existing.iter().any(|r| r.same_key(&record)) {
            return Err(CatalogError::Conflict(format!(
                "{} already exists for {} in semester {}",
                describe_resource(&record),
                record.subject,
                record.semester
            )));
        }
        self.write(&record)?;
        Ok(record)
    }

    fn upsert_file_resource(
        &self,
        mut record: ResourceRecord,
    ) -> CatalogResult<Upserted<ResourceRecord>> {
        if !record.resource_type.is_file_backed() {
            return Err(CatalogError::InvalidInput(format!(
                "{} records are not file-backed",
                record.resource_type
            )));
        }
        let _guard = self.guard();
        let previous = self
            .load_all::<ResourceRecord>()?
            .into_iter()
            .find(|r| r.same_key(&record));
        if let Some(previous) = &previous {
            record.id = previous.id.clone();
        }
        self.write(&record)?;
        Ok(Upserted { record, previous })
    }

    fn update_resource(&self, record: &ResourceRecord) -> CatalogResult<()> {
        let _guard = self.guard();
        if self.load::<ResourceRecord>(&record.id)?.is_none() {
            return Err(CatalogError::NotFound(format!("resource {}", record.id)));
        }
        let clash = self
            .load_all::<ResourceRecord>()?
            .into_iter()
            .any(|r| r.id != record.id && r.same_key(record));
        if clash {
            return Err(CatalogError::Conflict(format!(
                "another record already holds the key of resource {}",
                record.id
            )));
        }
        self.write(record)
    }

    fn delete_resource(&self, id: &CatalogId) -> CatalogResult<Option<ResourceRecord>> {
        let _guard = self.guard();
        let record = self.load::<ResourceRecord>(id)?;
        if record.is_some() {
            self.remove::<ResourceRecord>(id)?;
        }
        Ok(record)
    }

    fn delete_resources(&self, filter: &ResourceFilter) -> CatalogResult<Vec<ResourceRecord>> {
        let _guard = self.guard();
        let matching: Vec<ResourceRecord> = self
            .load_all::<ResourceRecord>()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        for record in &matching {
            self.remove::<ResourceRecord>(&record.id)?;
        }
        Ok(matching)
    }

    fn list_subjects(&self, semester: &str) -> CatalogResult<Vec<SubjectRecord>> {
        let _guard = self.guard();
        let mut subjects: Vec<SubjectRecord> = self
            .load_all::<SubjectRecord>()?
            .into_iter()
            .filter(|s| s.semester == semester)
            .collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subjects)
    }

    fn find_subject(&self, semester: &str, name: &str) -> CatalogResult<Option<SubjectRecord>> {
        let _guard = self.guard();
        Ok(self
            .load_all::<SubjectRecord>()?
            .into_iter()
            .find(|s| s.semester == semester && s.name == name))
    }

    fn insert_subject(&self, record: SubjectRecord) -> CatalogResult<SubjectRecord> {
        let _guard = self.guard();
        let duplicate = self
            .load_all::<SubjectRecord>()?
            .iter()
            .any(|s| s.semester == record.semester && s.name == record.name);
        if duplicate {
            return Err(CatalogError::Conflict(format!(
                "subject '{}' already exists for semester {}",
                record.name, record.semester
            )));
        }
        self.write(&record)?;
        Ok(record)
    }

    fn delete_subject(&self, semester: &str, name: &str) -> CatalogResult<bool> {
        let _guard = self.guard();
        let matching: Vec<SubjectRecord> = self
            .load_all::<SubjectRecord>()?
            .into_iter()
            .filter(|s| s.semester == semester && s.name == name)
            .collect();
        for subject in &matching {
            self.remove::<SubjectRecord>(&subject.id)?;
        }
        Ok(!matching.is_empty())
    }

    fn all_subjects(&self) -> CatalogResult<Vec<SubjectRecord>> {
        let _guard = self.guard();
        let mut subjects = self.load_all::<SubjectRecord>()?;
        subjects.sort_by(|a, b| (&a.semester, &a.name).cmp(&(&b.semester, &b.name)));
        Ok(subjects)
    }

    fn find_question_papers(
        &self,
        filter: &QuestionPaperFilter,
    ) -> CatalogResult<Vec<QuestionPaperRecord>> {
        let _guard = self.guard();
        let mut papers: Vec<QuestionPaperRecord> = self
            .load_all::<QuestionPaperRecord>()?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        papers.sort_by(|a, b| {
            (&a.year, a.semester, &a.subject, &a.exam_type)
                .cmp(&(&b.year, b.semester, &b.subject, &b.exam_type))
        });
        Ok(papers)
    }

    fn get_question_paper(&self, id: &CatalogId) -> CatalogResult<Option<QuestionPaperRecord>> {
        let _guard = self.guard();
        self.load(id)
    }

    fn upsert_question_paper(
        &self,
        mut record: QuestionPaperRecord,
    ) -> CatalogResult<Upserted<QuestionPaperRecord>> {
        let _guard = self.guard();
        let previous = self
            .load_all::<QuestionPaperRecord>()?
            .into_iter()
            .find(|p| p.same_key(&record));
        if let Some(previous) = &previous {
            record.id = previous.id.clone();
        }
        self.write(&record)?;
        Ok(Upserted { record, previous })
    }

    fn update_question_paper(&self, record: &QuestionPaperRecord) -> CatalogResult<()> {
        let _guard = self.guard();
        if self.load::<QuestionPaperRecord>(&record.id)?.is_none() {
            return Err(CatalogError::NotFound(format!("question paper {}", record.id)));
        }
        self.write(record)
    }

    fn delete_question_paper(&self, id: &CatalogId) -> CatalogResult<Option<QuestionPaperRecord>> {
        let _guard = self.guard();
        let record = self.load::<QuestionPaperRecord>(id)?;
        if record.is_some() {
            self.remove::<QuestionPaperRecord>(id)?;
        }
        Ok(record)
    }
}

fn describe_resource(record: &ResourceRecord) -> String {
    if record.resource_type.is_file_backed() {
        record.resource_type.to_string()
    } else {
        format!("channel '{}'", record.channel)
    }
}
