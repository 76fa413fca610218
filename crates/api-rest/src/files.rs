//! Downloads and event banner uploads.

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::extract::{blocking, Admin, FormData};
use crate::AppState;
use api_shared::wire::EventBannerRes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use portal_core::Download;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use portal_files::UploadTarget;
use serde::Deserialize;
use utoipa::ToSchema;

/// Multipart fields of `POST /api/uploads/event-banner`.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct EventBannerForm {
    /// JPEG, PNG or GIF
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Bytes outside the RFC 5987 `attr-char` set.
const EXT_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// `attachment; filename="..."` with an ASCII fallback, plus `filename*` carrying the exact
/// UTF-8 name when the fallback had to replace characters.
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let mut value = format!("attachment; filename=\"{}\"", fallback);
    if fallback != file_name {
        value.push_str("; filename*=UTF-8''");
        value.extend(utf8_percent_encode(file_name, EXT_VALUE));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn send(download: Download) -> ApiResult<Response> {
    let bytes = tokio::fs::read(&download.path).await.map_err(|e| {
        ApiError::Internal(format!("failed to read {}: {}", download.path.display(), e))
    })?;
    let content_type = HeaderValue::from_str(&download.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&download.file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/resource/download/{id}",
    params(("id" = String, Path, description = "Catalog id of a notes/books record or a question paper")),
    responses(
        (status = 200, description = "File bytes", content_type = "application/octet-stream"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Unknown record or missing file", body = ErrorBody)
    )
)]
pub async fn download_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let service = state.downloads.clone();
    let download = blocking(move || service.locate(&id)).await?;
    send(download).await
}

#[utoipa::path(
    get,
    path = "/question-papers/download/{id}",
    params(("id" = String, Path, description = "Catalog id of a question paper")),
    responses(
        (status = 200, description = "File bytes", content_type = "application/pdf"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Unknown paper or missing file", body = ErrorBody)
    )
)]
pub async fn download_question_paper(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let service = state.downloads.clone();
    let download = blocking(move || service.locate_question_paper(&id)).await?;
    send(download).await
}

#[utoipa::path(
    post,
    path = "/api/uploads/event-banner",
    request_body(content = EventBannerForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = EventBannerRes),
        (status = 413, description = "Image too large", body = ErrorBody),
        (status = 415, description = "Not a JPEG, PNG or GIF", body = ErrorBody)
    )
)]
/// Stores an event banner image. No catalog record is kept; the caller keeps the path.
pub async fn upload_event_banner(
    State(state): State<AppState>,
    _admin: Admin,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<EventBannerRes>)> {
    let mut form = FormData::read(multipart).await?;
    let file = form.take_file()?.into_incoming();
    let ingestor = state.banners.clone();

    let stored = blocking(move || {
        Ok(ingestor.ingest(
            &UploadTarget::event_banner(),
            &file.original_name,
            &file.content_type,
            file.body,
        )?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(EventBannerRes {
            message: "Event banner uploaded successfully".into(),
            path: stored.relative_path.to_string(),
            file_name: stored.original_name,
            size_bytes: stored.size_bytes,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_plain_names() {
        assert_eq!(
            content_disposition("Data Structures Unit 1.pdf"),
            "attachment; filename=\"Data Structures Unit 1.pdf\""
        );
    }

    #[test]
    fn disposition_replaces_quotes_and_non_ascii() {
        assert_eq!(
            content_disposition("the \"final\" résumé.pdf"),
            "attachment; filename=\"the _final_ r_sum_.pdf\"; \
             filename*=UTF-8''the%20%22final%22%20r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[test]
    fn disposition_keeps_the_exact_utf8_name() {
        let header = content_disposition("ডেটা স্ট্রাকচার.pdf");
        let value = header.to_str().unwrap();
        let (_, encoded) = value.split_once("filename*=UTF-8''").unwrap();
        let decoded = percent_encoding::percent_decode_str(encoded)
            .decode_utf8()
            .unwrap();
        assert_eq!(decoded, "ডেটা স্ট্রাকচার.pdf");
    }
}
