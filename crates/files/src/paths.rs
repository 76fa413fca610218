//! Canonical storage paths for catalogued files.
//!
//! This module contains **no I/O**. Every function maps metadata to a path relative to the
//! storage root, so the convention can be tested without touching a filesystem or catalog.
//! The only non-deterministic ingredient of a file name, the [`UniqueSuffix`], is an argument.
//!
//! # Path Structure
//!
//! ```text
//! resources/sem<semester>/<resourceType>/<subject>_<suffix>.<ext>
//! question-papers/<year>/<semester>/<subject>_<examType>_<suffix>.<ext>
//! events/event-<suffix>.<ext>
//! ```
//!
//! `subject` and `examType` are passed through [`sanitize_fragment`]; `semester` and `year`
//! directory segments keep `-` but are otherwise sanitized the same way.

use crate::constants::{
    EVENTS_DIR_NAME, QUESTION_PAPERS_DIR_NAME, RESOURCES_DIR_NAME, SEMESTER_DIR_PREFIX,
};
use portal_types::ResourceType;
use portal_uuid::UniqueSuffix;
use std::fmt;
use std::path::PathBuf;

/// A `/`-separated path relative to the storage root.
///
/// Catalog records store this string form regardless of the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelativeStoragePath(String);

impl RelativeStoragePath {
    fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform path built from the `/`-separated segments.
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.split('/').collect()
    }

    /// The directory part, if the path has more than one segment.
    pub fn parent(&self) -> Option<RelativeStoragePath> {
        self.0
            .rsplit_once('/')
            .map(|(dir, _)| RelativeStoragePath(dir.to_owned()))
    }

    /// Last segment of the path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for RelativeStoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativeStoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_fragment(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Sanitizes a directory segment, keeping `-` so values like `2023-24` stay readable.
fn sanitize_segment(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Normalises a stored path reference: `\` becomes `/` and a single leading `/` is removed.
pub fn normalize_stored_path(stored: &str) -> String {
    let unified = stored.trim().replace('\\', "/");
    match unified.strip_prefix('/') {
        Some(rest) => rest.to_owned(),
        None => unified,
    }
}

/// True when a normalised relative path stays inside the directory it is joined to.
pub fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains(':')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// `resources/sem<semester>/<resourceType>`
pub fn resource_dir(semester: &str, resource_type: ResourceType) -> RelativeStoragePath {
    RelativeStoragePath::from_segments([
        RESOURCES_DIR_NAME.to_owned(),
        format!("{}{}", SEMESTER_DIR_PREFIX, sanitize_segment(semester)),
        resource_type.as_str().to_owned(),
    ])
}

/// `resources/sem<semester>/<resourceType>/<subject>_<suffix>.<ext>`
pub fn resource_file(
    semester: &str,
    resource_type: ResourceType,
    subject: &str,
    extension: &str,
    suffix: &UniqueSuffix,
) -> RelativeStoragePath {
    let dir = resource_dir(semester, resource_type);
    let file_name = format!("{}_{}.{}", sanitize_fragment(subject), suffix, extension);
    RelativeStoragePath::from_segments([dir.as_str(), file_name.as_str()])
}

/// `question-papers/<year>/<semester>`
pub fn question_paper_dir(year: &str, semester: u8) -> RelativeStoragePath {
    RelativeStoragePath::from_segments([
        QUESTION_PAPERS_DIR_NAME.to_owned(),
        sanitize_segment(year),
        semester.to_string(),
    ])
}

/// `question-papers/<year>/<semester>/<subject>_<examType>_<suffix>.<ext>`
pub fn question_paper_file(
    year: &str,
    semester: u8,
    subject: &str,
    exam_type: &str,
    extension: &str,
    suffix: &UniqueSuffix,
) -> RelativeStoragePath {
    let dir = question_paper_dir(year, semester);
    let file_name = format!(
        "{}_{}_{}.{}",
        sanitize_fragment(subject),
        sanitize_fragment(exam_type),
        suffix,
        extension
    );
    RelativeStoragePath::from_segments([dir.as_str(), file_name.as_str()])
}

/// `events/event-<suffix>.<ext>`
pub fn event_banner_file(extension: &str, suffix: &UniqueSuffix) -> RelativeStoragePath {
    RelativeStoragePath::from_segments([
        EVENTS_DIR_NAME.to_owned(),
        format!("event-{}.{}", suffix, extension),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffix() -> UniqueSuffix {
        UniqueSuffix::from_parts(1718000000123, 42).unwrap()
    }

    fn only_safe_chars(segment: &str) -> bool {
        segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/' | b'-'))
    }

    #[test]
    fn sanitize_replaces_everything_outside_alphanumerics() {
        assert_eq!(sanitize_fragment("Data Structures"), "Data_Structures");
        assert_eq!(sanitize_fragment("C++ & OOP (II)"), "C_____OOP__II_");
        assert_eq!(sanitize_fragment("Théorie"), "Th_orie");
        assert_eq!(sanitize_fragment("../etc"), "___etc");
    }

    #[test]
    fn resource_path_follows_convention() {
        let path = resource_file("3", ResourceType::Notes, "Data Structures", "pdf", &suffix());
        assert_eq!(
            path.as_str(),
            "resources/sem3/notes/Data_Structures_1718000000123-42.pdf"
        );
        assert_eq!(path.parent().unwrap().as_str(), "resources/sem3/notes");
        assert_eq!(path.file_name(), "Data_Structures_1718000000123-42.pdf");
    }

    #[test]
    fn question_paper_path_follows_convention() {
        let path = question_paper_file("2023", 5, "Operating Systems", "Mid Term-1", "pdf", &suffix());
        assert_eq!(
            path.as_str(),
            "question-papers/2023/5/Operating_Systems_Mid_Term_1_1718000000123-42.pdf"
        );
    }

    #[test]
    fn hostile_inputs_cannot_escape_their_segment() {
        let inputs = ["../../etc/passwd", "a/b\\c", "名前", "x y:z", ".."];
        for input in inputs {
            let resource = resource_file(input, ResourceType::Books, input, "pdf", &suffix());
            let paper = question_paper_file(input, 1, input, input, "pdf", &suffix());
            for path in [&resource, &paper] {
                assert!(only_safe_chars(path.as_str()), "unsafe chars in {}", path);
                assert!(is_safe_relative(path.as_str()), "unsafe path {}", path);
            }
            assert_eq!(resource.as_str().split('/').count(), 4);
            assert_eq!(paper.as_str().split('/').count(), 4);
        }
    }

    #[test]
    fn convention_is_deterministic_for_fixed_suffix() {
        let a = resource_file("1", ResourceType::Books, "Maths", "pdf", &suffix());
        let b = resource_file("1", ResourceType::Books, "Maths", "pdf", &suffix());
        assert_eq!(a, b);
    }

    #[test]
    fn event_banner_path() {
        assert_eq!(
            event_banner_file("png", &suffix()).as_str(),
            "events/event-1718000000123-42.png"
        );
    }

    #[test]
    fn normalize_strips_one_leading_separator() {
        assert_eq!(normalize_stored_path("/resources/sem3/a.pdf"), "resources/sem3/a.pdf");
        assert_eq!(normalize_stored_path("\\resources\\sem3\\a.pdf"), "resources/sem3/a.pdf");
        assert_eq!(normalize_stored_path("//double"), "/double");
        assert_eq!(normalize_stored_path("plain/a.pdf"), "plain/a.pdf");
    }

    #[test]
    fn safe_relative_rejects_traversal() {
        assert!(is_safe_relative("resources/sem3/a.pdf"));
        assert!(!is_safe_relative("../a.pdf"));
        assert!(!is_safe_relative("resources/../../a.pdf"));
        assert!(!is_safe_relative("/abs/a.pdf"));
        assert!(!is_safe_relative("C:/a.pdf"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn to_path_buf_splits_segments() {
        let path = resource_dir("2", ResourceType::VideoMaterials);
        assert_eq!(
            path.to_path_buf(),
            PathBuf::from("resources").join("sem2").join("videoMaterials")
        );
    }
}
