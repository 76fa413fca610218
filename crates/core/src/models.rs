//! Catalog records and the filters used to query them.

use chrono::{DateTime, Utc};
use portal_types::ResourceType;
use portal_uuid::CatalogId;
use serde::{Deserialize, Serialize};

/// Metadata for a notes/books file or a video channel.
///
/// Notes and books are unique per (semester, subject, resourceType) and carry `file_url`.
/// Video materials are unique per (semester, subject, channel) and carry no file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub id: CatalogId,
    pub semester: String,
    pub resource_type: ResourceType,
    pub subject: String,
    /// Stored path relative to the storage root, empty when no file is held
    #[serde(default)]
    pub file_url: String,
    /// Original file name supplied by the uploader
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// True if `other` occupies the same uniqueness key.
    pub fn same_key(&self, other: &ResourceRecord) -> bool {
        self.semester == other.semester
            && self.subject == other.subject
            && self.resource_type == other.resource_type
            && (self.resource_type.is_file_backed() || self.channel == other.channel)
    }

    pub fn has_file(&self) -> bool {
        self.resource_type.is_file_backed() && !self.file_url.trim().is_empty()
    }
}

/// A subject taught in a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: CatalogId,
    pub semester: String,
    pub name: String,
}

/// Metadata for an uploaded question paper, unique per (year, semester, subject, examType).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaperRecord {
    pub id: CatalogId,
    pub year: String,
    pub semester: u8,
    pub subject: String,
    pub exam_type: String,
    pub file_path: String,
    pub file_name: String,
    pub uploaded_by: String,
    pub upload_date: DateTime<Utc>,
}

impl QuestionPaperRecord {
    pub fn same_key(&self, other: &QuestionPaperRecord) -> bool {
        self.year == other.year
            && self.semester == other.semester
            && self.subject == other.subject
            && self.exam_type == other.exam_type
    }
}

/// Conjunctive filter over resource records; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub semester: Option<String>,
    pub subject: Option<String>,
    pub resource_type: Option<ResourceType>,
    pub channel: Option<String>,
}

impl ResourceFilter {
    pub fn semester(semester: &str) -> Self {
        Self {
            semester: Some(semester.to_owned()),
            ..Self::default()
        }
    }

    pub fn subject(semester: &str, subject: &str) -> Self {
        Self {
            subject: Some(subject.to_owned()),
            ..Self::semester(semester)
        }
    }

    pub fn with_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_owned());
        self
    }

    pub fn matches(&self, record: &ResourceRecord) -> bool {
        self.semester.as_ref().map_or(true, |s| *s == record.semester)
            && self.subject.as_ref().map_or(true, |s| *s == record.subject)
            && self
                .resource_type
                .map_or(true, |t| t == record.resource_type)
            && self.channel.as_ref().map_or(true, |c| *c == record.channel)
    }
}

/// Conjunctive filter over question-paper records; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionPaperFilter {
    pub year: Option<String>,
    pub semester: Option<u8>,
    pub subject: Option<String>,
    pub exam_type: Option<String>,
}

impl QuestionPaperFilter {
    pub fn matches(&self, record: &QuestionPaperRecord) -> bool {
        self.year.as_ref().map_or(true, |y| *y == record.year)
            && self.semester.map_or(true, |s| s == record.semester)
            && self.subject.as_ref().map_or(true, |s| *s == record.subject)
            && self
                .exam_type
                .as_ref()
                .map_or(true, |e| *e == record.exam_type)
    }
}

/// A file accompanying an upload request.
#[derive(Debug)]
pub struct IncomingFile<R> {
    pub original_name: String,
    pub content_type: String,
    pub body: R,
}

/// Input of a notes/books upload, validated before any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResourceInput {
    pub semester: String,
    pub subject: String,
    pub resource_type: ResourceType,
}

/// Input of a video channel addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoChannelInput {
    pub semester: String,
    pub subject: String,
    pub channel: String,
    pub topics: Vec<String>,
}

impl VideoChannelInput {
    /// Splits a comma-separated topic list, dropping blanks.
    pub fn split_topics(topics: &str) -> Vec<String> {
        topics
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Input of a question-paper upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPaperInput {
    pub year: String,
    pub semester: u8,
    pub subject: String,
    pub exam_type: String,
    pub uploaded_by: String,
}

/// Result of an upsert: the stored record and the one it replaced, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
    pub record: T,
    pub previous: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(resource_type: ResourceType, channel: &str) -> ResourceRecord {
        ResourceRecord {
            id: CatalogId::new(),
            semester: "3".into(),
            resource_type,
            subject: "Data Structures".into(),
            file_url: String::new(),
            file_name: String::new(),
            channel: channel.into(),
            topics: vec![],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn video_key_includes_channel() {
        let a = record(ResourceType::VideoMaterials, "NPTEL");
        let b = record(ResourceType::VideoMaterials, "MIT OCW");
        assert!(!a.same_key(&b));
        assert!(a.same_key(&record(ResourceType::VideoMaterials, "NPTEL")));
        assert!(record(ResourceType::Notes, "").same_key(&record(ResourceType::Notes, "x")));
    }

    #[test]
    fn filter_is_conjunctive() {
        let notes = record(ResourceType::Notes, "");
        assert!(ResourceFilter::semester("3").matches(&notes));
        assert!(ResourceFilter::subject("3", "Data Structures")
            .with_type(ResourceType::Notes)
            .matches(&notes));
        assert!(!ResourceFilter::subject("3", "Data Structures")
            .with_type(ResourceType::Books)
            .matches(&notes));
        assert!(!ResourceFilter::semester("4").matches(&notes));
    }

    #[test]
    fn split_topics_trims_and_drops_blanks() {
        assert_eq!(
            VideoChannelInput::split_topics(" Trees, Graphs ,,Heaps "),
            vec!["Trees", "Graphs", "Heaps"]
        );
    }

    #[test]
    fn record_yaml_uses_camel_case() {
        let yaml = serde_yaml::to_string(&record(ResourceType::VideoMaterials, "NPTEL")).unwrap();
        assert!(yaml.contains("resourceType: videoMaterials"));
        assert!(yaml.contains("updatedAt:"));
    }
}
