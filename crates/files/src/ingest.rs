//! Upload ingestion
//!
//! The [`Ingestor`] validates an incoming upload against the media policy of its category, then
//! writes it under the canonical path produced by [`crate::paths`].
//!
//! # Guarantees
//!
//! - Nothing is written when validation fails (media type, extension, content sniffing, size)
//! - The stream is read through a bounded reader: at most `limit + 1` bytes are consumed
//! - Files are created with create-new semantics; an existing file is never overwritten
//! - A name collision is retried with a fresh suffix, at most five times
//!
//! The ingestor never touches the catalog. Callers upsert the catalog record after a successful
//! write and then call [`Ingestor::remove_superseded`] for the file the record used to point at.

use crate::constants::MAX_WRITE_ATTEMPTS;
use crate::media::MediaCategory;
use crate::paths::{self, is_safe_relative, normalize_stored_path, RelativeStoragePath};
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use portal_types::{NonEmptyText, ResourceType};
use portal_uuid::UniqueSuffix;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Where an upload belongs, with its required metadata already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// A notes or books file for a subject in a semester.
    Resource {
        semester: NonEmptyText,
        resource_type: ResourceType,
        subject: NonEmptyText,
    },
    /// A question paper for (year, semester, subject, exam type).
    QuestionPaper {
        year: NonEmptyText,
        semester: u8,
        subject: NonEmptyText,
        exam_type: NonEmptyText,
    },
    /// An event banner image. No catalog record is kept for these.
    EventBanner,
}

fn required(field: &str, value: &str) -> FilesResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| FilesError::Validation(format!("{} is required", field)))
}

impl UploadTarget {
    /// Builds a resource target.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Validation`] if `semester` or `subject` is blank, or if
    /// `resource_type` does not carry a file.
    pub fn resource(
        semester: &str,
        resource_type: ResourceType,
        subject: &str,
    ) -> FilesResult<Self> {
        if !resource_type.is_file_backed() {
            return Err(FilesError::Validation(format!(
                "{} uploads do not carry a file",
                resource_type
            )));
        }
        Ok(UploadTarget::Resource {
            semester: required("semester", semester)?,
            resource_type,
            subject: required("subject", subject)?,
        })
    }

    /// Builds a question-paper target.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::Validation`] if a text field is blank or `semester` is outside
    /// `1..=8`.
    pub fn question_paper(
        year: &str,
        semester: u8,
        subject: &str,
        exam_type: &str,
    ) -> FilesResult<Self> {
        if !(1..=8).contains(&semester) {
            return Err(FilesError::Validation(format!(
                "semester must be between 1 and 8, got {}",
                semester
            )));
        }
        Ok(UploadTarget::QuestionPaper {
            year: required("year", year)?,
            semester,
            subject: required("subject", subject)?,
            exam_type: required("examType", exam_type)?,
        })
    }

    pub fn event_banner() -> Self {
        UploadTarget::EventBanner
    }

    /// Media category whose policy applies to this target.
    pub fn category(&self) -> MediaCategory {
        match self {
            UploadTarget::Resource { .. } | UploadTarget::QuestionPaper { .. } => {
                MediaCategory::Document
            }
            UploadTarget::EventBanner => MediaCategory::Image,
        }
    }

    /// Canonical path for this target with the given extension and suffix.
    pub fn canonical_path(&self, extension: &str, suffix: &UniqueSuffix) -> RelativeStoragePath {
        match self {
            UploadTarget::Resource {
                semester,
                resource_type,
                subject,
            } => paths::resource_file(
                semester.as_str(),
                *resource_type,
                subject.as_str(),
                extension,
                suffix,
            ),
            UploadTarget::QuestionPaper {
                year,
                semester,
                subject,
                exam_type,
            } => paths::question_paper_file(
                year.as_str(),
                *semester,
                subject.as_str(),
                exam_type.as_str(),
                extension,
                suffix,
            ),
            UploadTarget::EventBanner => paths::event_banner_file(extension, suffix),
        }
    }
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the storage root, `/`-separated
    pub relative_path: RelativeStoragePath,

    /// File name as supplied by the uploader (directory components removed)
    pub original_name: String,

    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the stored bytes
    pub sha256: String,

    /// Accepted media type
    pub media_type: String,

    pub stored_at: DateTime<Utc>,
}

/// Writes validated uploads beneath a storage root.
#[derive(Debug, Clone)]
pub struct Ingestor {
    root: PathBuf,
}

impl Ingestor {
    /// Creates an ingestor bound to an existing storage root.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root: &Path) -> FilesResult<Self> {
        if !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not an existing directory: {}",
                root.display()
            )));
        }
        let root = root.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a relative storage path.
    pub fn absolute(&self, relative: &RelativeStoragePath) -> PathBuf {
        self.root.join(relative.to_path_buf())
    }

    /// Creates a directory beneath the storage root if it is absent.
    ///
    /// Idempotent and safe to race: a directory that already exists is not an error.
    pub fn ensure_directory(&self, relative: &RelativeStoragePath) -> FilesResult<PathBuf> {
        let dir = self.absolute(relative);
        match fs::create_dir_all(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory {}: {}", dir.display(), e),
            ))),
        }
    }

    /// Validates and stores an upload.
    ///
    /// # Arguments
    ///
    /// * `target` - Validated metadata deciding the canonical location
    /// * `original_name` - File name supplied by the uploader
    /// * `declared_mime` - Media type declared by the uploader
    /// * `reader` - Upload body
    ///
    /// # Returns
    ///
    /// The [`StoredFile`] describing the written file.
    ///
    /// # Errors
    ///
    /// - [`FilesError::UnsupportedMediaType`] if the declared type, extension or content is not
    ///   accepted for the target's category
    /// - [`FilesError::PayloadTooLarge`] if the body exceeds the category limit
    /// - [`FilesError::Io`] if reading the body, creating the directory or writing fails
    pub fn ingest(
        &self,
        target: &UploadTarget,
        original_name: &str,
        declared_mime: &str,
        reader: impl Read,
    ) -> FilesResult<StoredFile> {
        self.ingest_with(
            target,
            original_name,
            declared_mime,
            reader,
            UniqueSuffix::generate,
        )
    }

    fn ingest_with(
        &self,
        target: &UploadTarget,
        original_name: &str,
        declared_mime: &str,
        reader: impl Read,
        mut suffix_source: impl FnMut() -> UniqueSuffix,
    ) -> FilesResult<StoredFile> {
        let category = target.category();
        let accepted = category.check_declared(declared_mime, original_name)?;
        let bytes = read_bounded(reader, category.max_bytes())?;
        category.check_content(&bytes)?;

        let mut last_collision = None;
        for _attempt in 0..MAX_WRITE_ATTEMPTS {
            let relative = target.canonical_path(&accepted.extension, &suffix_source());
            if let Some(dir) = relative.parent() {
                self.ensure_directory(&dir)?;
            }
            let absolute = self.absolute(&relative);

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&absolute)
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("name collision at {}, retrying", relative);
                    last_collision = Some(relative);
                    continue;
                }
                Err(e) => {
                    return Err(FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create {}: {}", absolute.display(), e),
                    )))
                }
            };

            if let Err(e) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
                drop(file);
                if let Err(cleanup) = fs::remove_file(&absolute) {
                    tracing::warn!(
                        "failed to remove partial upload {}: {}",
                        absolute.display(),
                        cleanup
                    );
                }
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write {}: {}", absolute.display(), e),
                )));
            }

            let stored = StoredFile {
                original_name: display_name(original_name, &relative),
                size_bytes: bytes.len() as u64,
                sha256: hex::encode(Sha256::digest(&bytes)),
                media_type: accepted.media_type.to_owned(),
                stored_at: Utc::now(),
                relative_path: relative,
            };
            tracing::info!(
                "stored upload {} ({} bytes)",
                stored.relative_path,
                stored.size_bytes
            );
            return Ok(stored);
        }

        Err(FilesError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!(
                "failed to allocate a unique file name after {} attempts (last tried {})",
                MAX_WRITE_ATTEMPTS,
                last_collision
                    .map(|p| p.to_string())
                    .unwrap_or_default()
            ),
        )))
    }

    /// Unlinks a file a catalog record no longer points at.
    ///
    /// Failures are logged and swallowed. Returns true if a file was removed.
    pub fn remove_superseded(&self, stored: &str) -> bool {
        let relative = normalize_stored_path(stored);
        if !is_safe_relative(&relative) {
            tracing::warn!("refusing to remove file outside storage root: {}", stored);
            return false;
        }
        let path = self.root.join(relative.split('/').collect::<PathBuf>());
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("removed superseded file {}", relative);
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("superseded file already gone: {}", relative);
                false
            }
            Err(e) => {
                tracing::warn!("failed to remove superseded file {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// Reads at most `limit + 1` bytes and fails if the body is larger than `limit`.
fn read_bounded(reader: impl Read, limit: u64) -> FilesResult<Vec<u8>> {
    let mut buffer = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buffer)?;
    if buffer.len() as u64 > limit {
        return Err(FilesError::PayloadTooLarge { limit });
    }
    Ok(buffer)
}

fn display_name(original_name: &str, stored: &RelativeStoragePath) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name)
        .trim();
    if base.is_empty() {
        stored.file_name().to_owned()
    } else {
        base.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    fn fixed_suffix(nonce: u32) -> UniqueSuffix {
        UniqueSuffix::from_parts(1718000000000, nonce).unwrap()
    }

    fn count_files(dir: &Path) -> usize {
        if !dir.exists() {
            return 0;
        }
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .map(|p| if p.is_dir() { count_files(&p) } else { 1 })
            .sum()
    }

    #[test]
    fn new_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            Ingestor::new(&missing),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn ingest_writes_under_canonical_path() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::resource("3", ResourceType::Notes, "Data Structures").unwrap();

        let stored = ingestor
            .ingest(&target, "lecture notes.pdf", "application/pdf", PDF)
            .unwrap();

        let rel = stored.relative_path.as_str();
        assert!(rel.starts_with("resources/sem3/notes/Data_Structures_"), "{}", rel);
        assert!(rel.ends_with(".pdf"));
        assert_eq!(stored.original_name, "lecture notes.pdf");
        assert_eq!(stored.size_bytes, PDF.len() as u64);
        assert_eq!(stored.media_type, "application/pdf");
        assert_eq!(stored.sha256, hex::encode(Sha256::digest(PDF)));
        assert_eq!(fs::read(ingestor.absolute(&stored.relative_path)).unwrap(), PDF);
    }

    #[test]
    fn question_paper_target_validates_metadata() {
        assert!(matches!(
            UploadTarget::question_paper("2023", 9, "OS", "Final"),
            Err(FilesError::Validation(_))
        ));
        assert!(matches!(
            UploadTarget::question_paper("2023", 2, "OS", "  "),
            Err(FilesError::Validation(msg)) if msg.contains("examType")
        ));
        assert!(matches!(
            UploadTarget::resource("", ResourceType::Books, "OS"),
            Err(FilesError::Validation(msg)) if msg.contains("semester")
        ));
        assert!(matches!(
            UploadTarget::resource("1", ResourceType::VideoMaterials, "OS"),
            Err(FilesError::Validation(_))
        ));
    }

    #[test]
    fn rejected_uploads_write_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::resource("1", ResourceType::Books, "Maths").unwrap();

        let wrong_type = ingestor.ingest(&target, "a.txt", "text/plain", &b"hello"[..]);
        assert!(matches!(wrong_type, Err(FilesError::UnsupportedMediaType(_))));

        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let disguised = ingestor.ingest(&target, "a.pdf", "application/pdf", &png[..]);
        assert!(matches!(disguised, Err(FilesError::UnsupportedMediaType(_))));

        let limit = MediaCategory::Document.max_bytes();
        let mut big = PDF.to_vec();
        big.resize(limit as usize + 1, b' ');
        let oversized = ingestor.ingest(&target, "a.pdf", "application/pdf", Cursor::new(big));
        assert!(matches!(oversized, Err(FilesError::PayloadTooLarge { limit: l }) if l == limit));

        assert_eq!(count_files(temp_dir.path()), 0);
    }

    #[test]
    fn payload_at_limit_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let limit = MediaCategory::Image.max_bytes() as usize;
        let mut gif = b"GIF89a".to_vec();
        gif.resize(limit, 0);

        let stored = ingestor
            .ingest(&UploadTarget::event_banner(), "banner.gif", "image/gif", Cursor::new(gif))
            .unwrap();
        assert!(stored.relative_path.as_str().starts_with("events/event-"));
        assert_eq!(stored.size_bytes, limit as u64);
    }

    #[test]
    fn collision_retries_with_fresh_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::resource("2", ResourceType::Notes, "Physics").unwrap();

        let first = ingestor
            .ingest_with(&target, "p.pdf", "application/pdf", PDF, || fixed_suffix(1))
            .unwrap();

        let mut nonces = vec![1, 2].into_iter();
        let second = ingestor
            .ingest_with(&target, "p.pdf", "application/pdf", PDF, || {
                fixed_suffix(nonces.next().unwrap())
            })
            .unwrap();

        assert_ne!(first.relative_path, second.relative_path);
        assert!(second.relative_path.as_str().ends_with("1718000000000-2.pdf"));
    }

    #[test]
    fn collision_gives_up_after_five_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::resource("2", ResourceType::Notes, "Physics").unwrap();

        ingestor
            .ingest_with(&target, "p.pdf", "application/pdf", PDF, || fixed_suffix(7))
            .unwrap();

        let mut calls = 0;
        let result = ingestor.ingest_with(&target, "p.pdf", "application/pdf", PDF, || {
            calls += 1;
            fixed_suffix(7)
        });
        assert!(matches!(result, Err(FilesError::Io(e)) if e.kind() == ErrorKind::AlreadyExists));
        assert_eq!(calls, MAX_WRITE_ATTEMPTS);
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let dir = paths::resource_dir("4", ResourceType::Books);

        let first = ingestor.ensure_directory(&dir).unwrap();
        let second = ingestor.ensure_directory(&dir).unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn remove_superseded_is_non_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::resource("1", ResourceType::Notes, "Chem").unwrap();
        let stored = ingestor
            .ingest(&target, "c.pdf", "application/pdf", PDF)
            .unwrap();

        let leading = format!("/{}", stored.relative_path);
        assert!(ingestor.remove_superseded(&leading));
        assert!(!ingestor.absolute(&stored.relative_path).exists());
        assert!(!ingestor.remove_superseded(stored.relative_path.as_str()));
        assert!(!ingestor.remove_superseded("../outside.pdf"));
    }

    #[test]
    fn original_name_drops_directories() {
        let temp_dir = TempDir::new().unwrap();
        let ingestor = Ingestor::new(temp_dir.path()).unwrap();
        let target = UploadTarget::question_paper("2022", 4, "DBMS", "End Sem").unwrap();

        let stored = ingestor
            .ingest(&target, "C:\\Users\\me\\dbms.pdf", "application/pdf", PDF)
            .unwrap();
        assert_eq!(stored.original_name, "dbms.pdf");
        assert!(stored
            .relative_path
            .as_str()
            .starts_with("question-papers/2022/4/DBMS_End_Sem_"));
    }
}
