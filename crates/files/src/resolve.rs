//! Tiered resolution of stored path references.
//!
//! A catalog record's stored path may have drifted from what is on disk: a leading separator
//! from an older writer, backslashes, a renamed suffix, or a file moved by hand. The [`Resolver`]
//! tries a fixed sequence of tiers and stops at the first hit:
//!
//! 1. **Canonical**: the normalised stored path joined to the storage root
//! 2. **Structural**: files in the directory the path convention would have used. Resource names
//!    must be `<Subject>_<suffix>` exactly; question-paper names must contain every sanitized
//!    fragment. The newest candidate wins
//! 3. **Exhaustive**: a sorted depth-first walk of the whole storage root matching any name hint
//!    (diagnostics only, see [`Resolver::resolve_exhaustive`])
//!
//! Resolution never mutates the storage tree. I/O errors in the fallback tiers count as misses.

use crate::paths::{
    self, is_safe_relative, normalize_stored_path, sanitize_fragment, RelativeStoragePath,
};
use crate::ResolveError;
use portal_types::ResourceType;
use portal_uuid::UniqueSuffix;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the resolver may use to locate a record's file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveQuery {
    /// Stored path reference as persisted in the catalog
    pub stored_path: Option<String>,

    /// Directory the path convention assigns to the record
    pub structural_dir: Option<RelativeStoragePath>,

    /// Sanitized fragments a structural candidate's name must all contain
    pub fragments: Vec<String>,

    /// Stem prefix a structural candidate must carry, followed by nothing but a unique suffix
    pub suffixed_prefix: Option<String>,

    /// Name fragments any of which identifies an exhaustive-walk candidate
    pub name_hints: Vec<String>,
}

impl ResolveQuery {
    /// Query for a notes/books record.
    pub fn resource(
        semester: &str,
        resource_type: ResourceType,
        subject: &str,
        stored_path: &str,
        file_name: &str,
    ) -> Self {
        let subject = sanitize_fragment(subject.trim());
        Self {
            stored_path: non_blank(stored_path),
            structural_dir: Some(paths::resource_dir(semester, resource_type)),
            fragments: Vec::new(),
            suffixed_prefix: (!subject.is_empty()).then(|| format!("{}_", subject)),
            name_hints: name_hints(stored_path, file_name, &subject),
        }
    }

    /// Query for a question-paper record.
    pub fn question_paper(
        year: &str,
        semester: u8,
        subject: &str,
        exam_type: &str,
        stored_path: &str,
        file_name: &str,
    ) -> Self {
        let subject = sanitize_fragment(subject.trim());
        let exam_type = sanitize_fragment(exam_type.trim());
        Self {
            stored_path: non_blank(stored_path),
            structural_dir: Some(paths::question_paper_dir(year, semester)),
            fragments: non_empty_fragments([subject.clone(), exam_type]),
            suffixed_prefix: None,
            name_hints: name_hints(stored_path, file_name, &subject),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn non_empty_fragments<const N: usize>(fragments: [String; N]) -> Vec<String> {
    fragments.into_iter().filter(|f| !f.is_empty()).collect()
}

/// Stem of the stored file name, stem of the uploader's file name, then the sanitized subject.
fn name_hints(stored_path: &str, file_name: &str, sanitized_subject: &str) -> Vec<String> {
    let stored_name = normalize_stored_path(stored_path);
    let stored_name = stored_name.rsplit('/').next().unwrap_or_default();
    let mut hints: Vec<String> = Vec::new();
    for candidate in [stem(stored_name), stem(file_name.trim()), sanitized_subject] {
        if !candidate.is_empty() && !hints.iter().any(|h| h == candidate) {
            hints.push(candidate.to_owned());
        }
    }
    hints
}

fn stem(name: &str) -> &str {
    name.split('.').next().unwrap_or_default()
}

/// Which tier located the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveTier {
    Canonical,
    Structural,
    Exhaustive,
}

/// A located file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    pub tier: ResolveTier,
}

/// Read-only file lookup beneath a storage root.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs the canonical and structural tiers.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] listing every path examined when both tiers miss.
    pub fn resolve(&self, query: &ResolveQuery) -> Result<Resolved, ResolveError> {
        let mut attempted = Vec::new();
        if let Some(found) = self.fast_tiers(query, &mut attempted) {
            return Ok(found);
        }
        Err(self.not_found(attempted))
    }

    /// Runs all three tiers, including the walk of the entire storage root.
    ///
    /// The walk is unbounded in depth, so this belongs on diagnostic paths only.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] listing every path examined when all tiers miss.
    pub fn resolve_exhaustive(&self, query: &ResolveQuery) -> Result<Resolved, ResolveError> {
        let mut attempted = Vec::new();
        if let Some(found) = self.fast_tiers(query, &mut attempted) {
            return Ok(found);
        }
        if let Some(path) = self.exhaustive(query, &mut attempted) {
            return Ok(Resolved {
                path,
                tier: ResolveTier::Exhaustive,
            });
        }
        Err(self.not_found(attempted))
    }

    /// Joins a stored path reference to the root after normalisation.
    ///
    /// Returns `None` when the reference is blank or would escape the root.
    pub fn canonical(&self, stored_path: &str) -> Option<PathBuf> {
        let normalized = normalize_stored_path(stored_path);
        if !is_safe_relative(&normalized) {
            return None;
        }
        Some(self.root.join(normalized.split('/').collect::<PathBuf>()))
    }

    /// `/`-separated form of `path` relative to the root, if it lies beneath it.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        (!segments.is_empty()).then(|| segments.join("/"))
    }

    fn fast_tiers(&self, query: &ResolveQuery, attempted: &mut Vec<PathBuf>) -> Option<Resolved> {
        if let Some(stored) = &query.stored_path {
            match self.canonical(stored) {
                Some(candidate) => {
                    tracing::debug!("canonical tier: {}", candidate.display());
                    if candidate.is_file() {
                        return Some(Resolved {
                            path: candidate,
                            tier: ResolveTier::Canonical,
                        });
                    }
                    attempted.push(candidate);
                }
                None => tracing::debug!("canonical tier skipped unsafe path {:?}", stored),
            }
        }

        if let Some(dir) = &query.structural_dir {
            let dir = self.root.join(dir.to_path_buf());
            tracing::debug!("structural tier: {}", dir.display());
            let hit = self.structural(&dir, query);
            attempted.push(dir);
            if let Some(path) = hit {
                return Some(Resolved {
                    path,
                    tier: ResolveTier::Structural,
                });
            }
        }
        None
    }

    fn structural(&self, dir: &Path, query: &ResolveQuery) -> Option<PathBuf> {
        if query.fragments.is_empty() && query.suffixed_prefix.is_none() {
            return None;
        }
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("structural tier miss at {}: {}", dir.display(), e);
                return None;
            }
        };

        let names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok());

        let best = match &query.suffixed_prefix {
            Some(prefix) => names
                .filter_map(|name| {
                    let suffix = suffix_after(&name, prefix)?;
                    Some(((suffix.millis(), suffix.nonce()), name))
                })
                .max(),
            None => names
                .filter(|name| query.fragments.iter().all(|f| name.contains(f.as_str())))
                .map(|name| ((0, 0), name))
                .max(),
        };
        best.map(|(_, name)| dir.join(name))
    }

    fn exhaustive(&self, query: &ResolveQuery, attempted: &mut Vec<PathBuf>) -> Option<PathBuf> {
        attempted.push(self.root.clone());
        if query.name_hints.is_empty() {
            return None;
        }
        tracing::debug!("exhaustive tier: walking {}", self.root.display());
        walk_sorted(&self.root, &query.name_hints)
    }

    fn not_found(&self, mut attempted: Vec<PathBuf>) -> ResolveError {
        if attempted.is_empty() {
            attempted.push(self.root.clone());
        }
        ResolveError::NotFound { attempted }
    }
}

/// The unique suffix of `name` when its stem is `prefix` followed by the suffix alone.
fn suffix_after(name: &str, prefix: &str) -> Option<UniqueSuffix> {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.strip_prefix(prefix)?.parse().ok()
}

/// Depth-first walk in name order; the first file whose name contains any hint wins.
///
/// Symlinks are not followed.
fn walk_sorted(dir: &Path, hints: &[String]) -> Option<PathBuf> {
    let mut entries: Vec<fs::DirEntry> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            tracing::debug!("exhaustive tier cannot read {}: {}", dir.display(), e);
            return None;
        }
    };
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            if let Some(found) = walk_sorted(&path, hints) {
                return Some(found);
            }
        } else if file_type.is_file() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if hints.iter().any(|hint| name.contains(hint.as_str())) {
                return Some(path);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    fn notes_query(stored: &str) -> ResolveQuery {
        ResolveQuery::resource("3", ResourceType::Notes, "Data Structures", stored, "ds.pdf")
    }

    #[test]
    fn canonical_tier_strips_leading_separator() {
        let temp_dir = TempDir::new().unwrap();
        let file = touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_1-1.pdf");
        let resolver = Resolver::new(temp_dir.path());

        for stored in [
            "/resources/sem3/notes/Data_Structures_1-1.pdf",
            "\\resources\\sem3\\notes\\Data_Structures_1-1.pdf",
            "resources/sem3/notes/Data_Structures_1-1.pdf",
        ] {
            let resolved = resolver.resolve(&notes_query(stored)).unwrap();
            assert_eq!(resolved.tier, ResolveTier::Canonical);
            assert_eq!(resolved.path, file);
        }
    }

    #[test]
    fn structural_tier_prefers_newest_suffix() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_1700000000000-5.pdf");
        let newest = touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_1718000000000-1.pdf");
        touch(temp_dir.path(), "resources/sem3/notes/Algorithms_1719000000000-1.pdf");
        let resolver = Resolver::new(temp_dir.path());

        let resolved = resolver
            .resolve(&notes_query("resources/sem3/notes/Data_Structures_stale.pdf"))
            .unwrap();
        assert_eq!(resolved.tier, ResolveTier::Structural);
        assert_eq!(resolved.path, newest);
    }

    #[test]
    fn structural_tier_ignores_subjects_sharing_a_prefix() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_Lab_1718000000000-1.pdf");
        touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_notes.pdf");
        let resolver = Resolver::new(temp_dir.path());
        let query = notes_query("resources/sem3/notes/Data_Structures_stale.pdf");

        assert!(matches!(
            resolver.resolve(&query),
            Err(ResolveError::NotFound { .. })
        ));

        let own = touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_1700000000000-2.pdf");
        assert_eq!(resolver.resolve(&query).unwrap().path, own);

        let short = ResolveQuery::resource("3", ResourceType::Notes, "C", "", "c.pdf");
        assert!(resolver.resolve(&short).is_err());
    }

    #[test]
    fn structural_tier_orders_suffixes_numerically() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_999999999999-9.pdf");
        let newest = touch(temp_dir.path(), "resources/sem3/notes/Data_Structures_1000000000000-1.pdf");
        let resolver = Resolver::new(temp_dir.path());

        let resolved = resolver.resolve(&notes_query("")).unwrap();
        assert_eq!(resolved.path, newest);
    }

    #[test]
    fn structural_tier_requires_every_fragment() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "question-papers/2023/5/OS_Mid_1-1.pdf");
        let end = touch(temp_dir.path(), "question-papers/2023/5/OS_End_1-1.pdf");
        let resolver = Resolver::new(temp_dir.path());

        let query = ResolveQuery::question_paper("2023", 5, "OS", "End", "", "os.pdf");
        let resolved = resolver.resolve(&query).unwrap();
        assert_eq!(resolved.path, end);
    }

    #[test]
    fn miss_reports_attempted_paths() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = Resolver::new(temp_dir.path());

        match resolver.resolve(&notes_query("/resources/sem3/notes/gone.pdf")) {
            Err(ResolveError::NotFound { attempted }) => {
                assert_eq!(attempted.len(), 2);
                assert_eq!(
                    attempted[0],
                    temp_dir.path().join("resources/sem3/notes/gone.pdf")
                );
                assert_eq!(attempted[1], temp_dir.path().join("resources/sem3/notes"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }

        match resolver.resolve(&ResolveQuery::default()) {
            Err(ResolveError::NotFound { attempted }) => assert!(!attempted.is_empty()),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn traversal_is_never_followed() {
        let temp_dir = TempDir::new().unwrap();
        let storage = temp_dir.path().join("uploads");
        fs::create_dir_all(&storage).unwrap();
        touch(temp_dir.path(), "secret.pdf");
        let resolver = Resolver::new(&storage);

        let query = ResolveQuery {
            stored_path: Some("../secret.pdf".into()),
            ..ResolveQuery::default()
        };
        assert!(resolver.resolve(&query).is_err());
        assert!(resolver.canonical("../secret.pdf").is_none());
    }

    #[test]
    fn exhaustive_tier_is_opt_in() {
        let temp_dir = TempDir::new().unwrap();
        let moved = touch(temp_dir.path(), "misc/old/Data_Structures_1-1.pdf");
        let resolver = Resolver::new(temp_dir.path());
        let query = notes_query("resources/sem3/notes/Data_Structures_1-1.pdf");

        assert!(resolver.resolve(&query).is_err());
        let resolved = resolver.resolve_exhaustive(&query).unwrap();
        assert_eq!(resolved.tier, ResolveTier::Exhaustive);
        assert_eq!(resolved.path, moved);
        assert_eq!(
            resolver.relative(&resolved.path).as_deref(),
            Some("misc/old/Data_Structures_1-1.pdf")
        );
    }

    #[test]
    fn exhaustive_walk_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let first = touch(temp_dir.path(), "a/Data_Structures_x.pdf");
        touch(temp_dir.path(), "b/Data_Structures_y.pdf");
        let resolver = Resolver::new(temp_dir.path());
        let query = notes_query("");

        for _ in 0..3 {
            assert_eq!(resolver.resolve_exhaustive(&query).unwrap().path, first);
        }
    }

    #[test]
    fn name_hints_deduplicate_and_skip_blanks() {
        let query = ResolveQuery::resource(
            "1",
            ResourceType::Books,
            "Maths",
            "/resources/sem1/books/Maths_1-1.pdf",
            "",
        );
        assert_eq!(query.name_hints, vec!["Maths_1-1".to_owned(), "Maths".to_owned()]);
        assert_eq!(query.suffixed_prefix.as_deref(), Some("Maths_"));
        assert!(query.fragments.is_empty());
    }
}
