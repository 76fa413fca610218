//! Request and response bodies shared by the catalog services and the HTTP surface.
//!
//! All bodies use camelCase field names on the wire.

use portal_types::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

/// One video channel recorded for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VideoChannel {
    pub channel: String,
    pub topics: Vec<String>,
}

/// Everything catalogued for a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SemesterOverview {
    pub semester: String,
    /// Subject names, sorted
    pub subjects: Vec<String>,
    /// Subject to stored file path, `""` when nothing is uploaded
    pub notes: BTreeMap<String, String>,
    pub books: BTreeMap<String, String>,
    /// Subject to channels, empty when none are recorded
    pub video_materials: BTreeMap<String, Vec<VideoChannel>>,
}

/// A stored notes/books file as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileEntry {
    pub id: String,
    pub url: String,
    pub name: String,
}

/// Resources of one type keyed by subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TypeEntries {
    Files(BTreeMap<String, FileEntry>),
    Videos(BTreeMap<String, Vec<VideoChannel>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypeListing {
    pub semester: String,
    #[schema(value_type = String)]
    pub resource_type: ResourceType,
    pub resources: TypeEntries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubjectsRes {
    pub semester: String,
    pub subjects: Vec<String>,
}

/// Identifies a subject within a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubjectReq {
    pub semester: String,
    pub name: String,
}

/// Outcome of a (re-runnable) subject delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDeleteRes {
    pub message: String,
    /// False when the subject record was already gone
    pub subject_removed: bool,
    pub resources_removed: usize,
    pub files_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResourceReq {
    pub semester: String,
    pub subject: String,
    #[schema(value_type = String)]
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteVideoReq {
    pub semester: String,
    pub subject: String,
    pub channel: String,
}

/// Result of a notes/books upload or a video channel addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUploadRes {
    pub message: String,
    pub id: String,
    pub semester: String,
    pub subject: String,
    #[schema(value_type = String)]
    pub resource_type: ResourceType,
    /// Stored path, empty for video channels
    pub file_url: String,
    pub file_name: String,
    /// True when an existing record was updated in place
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaperUploadRes {
    pub message: String,
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub replaced: bool,
}

/// Leaf of the question-paper listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaperEntry {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
}

/// subject → examType → paper
pub type SubjectPapers = BTreeMap<String, BTreeMap<String, PaperEntry>>;

/// `year → semester → subject → examType → paper`.
///
/// Years serialize in descending order, semesters and subjects ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct QuestionPaperTree(
    #[schema(value_type = Object)] pub BTreeMap<String, BTreeMap<u8, SubjectPapers>>,
);

impl Serialize for QuestionPaperTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (year, semesters) in self.0.iter().rev() {
            map.serialize_entry(year, semesters)?;
        }
        map.end()
    }
}

/// Result of storing an event banner image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventBannerRes {
    pub message: String,
    pub path: String,
    pub file_name: String,
    pub size_bytes: u64,
}

/// Kind of record a path diagnosis refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Resource,
    QuestionPaper,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathDiagnosis {
    pub id: String,
    pub kind: RecordKind,
    pub file_name: String,
    pub stored_path: String,
    pub exists: bool,
    /// Absolute location that was found, if any
    pub resolved_path: Option<String>,
    /// Storage-root-relative path of a likely match, for broken records only
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DiagnoseReport {
    pub total: usize,
    pub working: usize,
    pub broken: usize,
    pub details: Vec<PathDiagnosis>,
}

/// Caller-supplied correction. Missing fields are reported per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathFix {
    pub id: Option<String>,
    pub new_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FixPathsReq {
    #[serde(default)]
    pub fixes: Vec<PathFix>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FixOutcome {
    pub id: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FixPathsReport {
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub details: Vec<FixOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeStatus {
    Fixed,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizeOutcome {
    pub id: String,
    pub original: String,
    pub fixed: Option<String>,
    pub status: NormalizeStatus,
    /// Why the stored path could not be rewritten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizeReport {
    pub total: usize,
    pub fixed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub results: Vec<NormalizeOutcome>,
}

/// A resource record whose subject no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrphanOutcome {
    pub id: String,
    pub semester: String,
    pub subject: String,
    #[schema(value_type = String)]
    pub resource_type: ResourceType,
    pub file_url: String,
    pub record_removed: bool,
    pub file_removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReconcileReport {
    pub applied: bool,
    pub orphans: usize,
    pub removed: usize,
    pub details: Vec<OrphanOutcome>,
}
