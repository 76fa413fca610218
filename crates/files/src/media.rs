//! Media policy: allow-lists and byte limits per upload category.

use crate::{FilesError, FilesResult};

const MIB: u64 = 1024 * 1024;

/// Upload category. Each category has its own media allow-list and size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    /// Notes, books and question papers (PDF only).
    Document,
    /// Event banners (JPEG, PNG, GIF).
    Image,
}

/// Media type and extension accepted for a single upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMedia {
    pub media_type: &'static str,
    pub extension: String,
}

/// (media type, permitted extensions); the first extension is the default.
type Allowed = (&'static str, &'static [&'static str]);

const DOCUMENT_TYPES: &[Allowed] = &[("application/pdf", &["pdf"])];

const IMAGE_TYPES: &[Allowed] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
];

impl MediaCategory {
    /// Maximum accepted payload in bytes.
    pub fn max_bytes(&self) -> u64 {
        match self {
            MediaCategory::Document => 10 * MIB,
            MediaCategory::Image => 5 * MIB,
        }
    }

    fn allowed(&self) -> &'static [Allowed] {
        match self {
            MediaCategory::Document => DOCUMENT_TYPES,
            MediaCategory::Image => IMAGE_TYPES,
        }
    }

    /// Checks the declared media type and the original file name's extension.
    ///
    /// Parameters after `;` in the declared type are ignored and comparison is case-insensitive.
    /// When the original name has no usable extension the media type's default is used.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::UnsupportedMediaType`] if the declared type is not in the category's
    /// allow-list or the extension does not belong to the declared type.
    pub fn check_declared(
        &self,
        declared_mime: &str,
        original_name: &str,
    ) -> FilesResult<AcceptedMedia> {
        let mime = declared_mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let (media_type, extensions) = self
            .allowed()
            .iter()
            .find(|(allowed, _)| *allowed == mime)
            .ok_or_else(|| {
                FilesError::UnsupportedMediaType(format!(
                    "'{}' is not accepted for {} uploads",
                    declared_mime,
                    self.label()
                ))
            })?;

        let extension = match file_extension(original_name) {
            Some(ext) if extensions.contains(&ext.as_str()) => ext,
            Some(ext) => {
                return Err(FilesError::UnsupportedMediaType(format!(
                    "extension '.{}' does not match media type {}",
                    ext, media_type
                )))
            }
            None => extensions[0].to_owned(),
        };

        Ok(AcceptedMedia {
            media_type,
            extension,
        })
    }

    /// Rejects content whose magic bytes identify a type outside the allow-list.
    ///
    /// Content that `infer` cannot identify is accepted on the strength of the declared type.
    pub fn check_content(&self, bytes: &[u8]) -> FilesResult<()> {
        match infer::get(bytes) {
            Some(kind)
                if !self
                    .allowed()
                    .iter()
                    .any(|(allowed, _)| *allowed == kind.mime_type()) =>
            {
                Err(FilesError::UnsupportedMediaType(format!(
                    "content looks like {}, which is not accepted for {} uploads",
                    kind.mime_type(),
                    self.label()
                )))
            }
            _ => Ok(()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MediaCategory::Document => "document",
            MediaCategory::Image => "image",
        }
    }
}

/// Lowercased extension of `name` restricted to `[a-z0-9]`, if any remains.
fn file_extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!ext.is_empty()).then_some(ext)
}
