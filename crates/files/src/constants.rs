//! Directory names under the storage root.

/// Top-level directory for notes and books.
pub const RESOURCES_DIR_NAME: &str = "resources";

/// Top-level directory for question papers.
pub const QUESTION_PAPERS_DIR_NAME: &str = "question-papers";

/// Top-level directory for event banner images.
pub const EVENTS_DIR_NAME: &str = "events";

/// Prefix of the per-semester directory under `resources/`.
pub const SEMESTER_DIR_PREFIX: &str = "sem";

/// Legacy top-level segment some stored paths still carry (`uploads/...`).
pub const LEGACY_UPLOADS_SEGMENT: &str = "uploads";

/// Number of attempts at finding a free file name before giving up.
pub const MAX_WRITE_ATTEMPTS: usize = 5;
