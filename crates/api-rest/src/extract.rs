//! Request extraction shared by the handlers: the admin check, multipart forms and the bridge
//! onto the blocking pool.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use api_shared::Caller;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Multipart};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use portal_core::{CatalogResult, IncomingFile};
use std::collections::BTreeMap;
use std::io::Cursor;

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct Admin(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Err(ApiError::Unauthorized(
                "this operation requires admin credentials".into(),
            ));
        };
        let header = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized("authorization header is not valid text".into()))?;

        let caller = state.auth.authenticate(Some(header))?;
        caller.require_admin()?;
        Ok(Admin(caller))
    }
}

/// The `file` part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedPart {
    pub fn into_incoming(self) -> IncomingFile<Cursor<Bytes>> {
        IncomingFile {
            original_name: self.file_name,
            content_type: self.content_type,
            body: Cursor::new(self.bytes),
        }
    }
}

/// A multipart form read in full: text fields by name plus the optional `file` part.
#[derive(Debug, Default)]
pub struct FormData {
    fields: BTreeMap<String, String>,
    pub file: Option<UploadedPart>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await?;
                form.file = Some(UploadedPart {
                    file_name,
                    content_type,
                    bytes,
                });
            } else if !name.is_empty() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// A text field, trimmed; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| ApiError::Validation(format!("{} is required", name)))
    }

    pub fn take_file(&mut self) -> ApiResult<UploadedPart> {
        self.file
            .take()
            .filter(|f| !f.file_name.trim().is_empty())
            .ok_or_else(|| ApiError::Validation("file is required".into()))
    }
}

/// Runs a blocking catalog operation on tokio's blocking pool.
pub async fn blocking<T, F>(op: F) -> ApiResult<T>
where
    F: FnOnce() -> CatalogResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}
