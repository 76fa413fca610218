//! Semester listings, subjects and notes/books/video uploads.

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::extract::{blocking, Admin, FormData};
use crate::AppState;
use api_shared::wire::{
    DeleteResourceReq, DeleteVideoReq, MessageRes, ResourceUploadRes, SemesterOverview,
    SubjectDeleteRes, SubjectReq, SubjectsRes, TypeListing,
};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use portal_core::{FileResourceInput, VideoChannelInput};
use portal_types::ResourceType;
use serde::Deserialize;
use utoipa::ToSchema;

/// Multipart fields of `POST /api/resources/upload`.
///
/// `file` is required for notes and books; `channel` and `topics` for video materials.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUploadForm {
    semester: String,
    subject: String,
    /// `notes`, `books` or `videoMaterials`
    resource_type: String,
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<Vec<u8>>,
    channel: Option<String>,
    /// Comma-separated
    topics: Option<String>,
}

fn parse_type(value: &str) -> ApiResult<ResourceType> {
    value
        .parse()
        .map_err(|e: portal_types::TextError| ApiError::Validation(e.to_string()))
}

#[utoipa::path(
    get,
    path = "/resources/{semester}",
    params(("semester" = String, Path, description = "Semester number")),
    responses(
        (status = 200, description = "Everything catalogued for the semester", body = SemesterOverview),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Semester overview: subjects plus notes, books and video channels per subject.
pub async fn semester_overview(
    State(state): State<AppState>,
    Path(semester): Path<String>,
) -> ApiResult<Json<SemesterOverview>> {
    let service = state.resources.clone();
    let overview = blocking(move || service.semester_overview(&semester)).await?;
    Ok(Json(overview))
}

#[utoipa::path(
    get,
    path = "/resources/{semester}/{type}",
    params(
        ("semester" = String, Path, description = "Semester number"),
        ("type" = String, Path, description = "`notes`, `books` or `videoMaterials`")
    ),
    responses(
        (status = 200, description = "Resources of one type keyed by subject", body = TypeListing),
        (status = 400, description = "Unknown resource type", body = ErrorBody)
    )
)]
pub async fn list_by_type(
    State(state): State<AppState>,
    Path((semester, kind)): Path<(String, String)>,
) -> ApiResult<Json<TypeListing>> {
    let resource_type = parse_type(&kind)?;
    let service = state.resources.clone();
    let listing = blocking(move || service.list_by_type(&semester, resource_type)).await?;
    Ok(Json(listing))
}

#[utoipa::path(
    get,
    path = "/api/subjects/{semester}",
    params(("semester" = String, Path, description = "Semester number")),
    responses((status = 200, description = "Subject names, sorted", body = SubjectsRes))
)]
pub async fn subject_names(
    State(state): State<AppState>,
    Path(semester): Path<String>,
) -> ApiResult<Json<SubjectsRes>> {
    let service = state.resources.clone();
    let semester = semester.trim().to_owned();
    let query = semester.clone();
    let subjects = blocking(move || service.subject_names(&query)).await?;
    Ok(Json(SubjectsRes { semester, subjects }))
}

#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = SubjectReq,
    responses(
        (status = 201, description = "Subject added", body = MessageRes),
        (status = 400, description = "Blank semester or name", body = ErrorBody),
        (status = 409, description = "Subject already exists", body = ErrorBody)
    )
)]
pub async fn add_subject(
    State(state): State<AppState>,
    _admin: Admin,
    Json(req): Json<SubjectReq>,
) -> ApiResult<(StatusCode, Json<MessageRes>)> {
    let service = state.resources.clone();
    let record = blocking(move || service.add_subject(&req.semester, &req.name)).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageRes {
            message: format!(
                "Subject {} added to semester {}",
                record.name, record.semester
            ),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/subjects",
    request_body = SubjectReq,
    responses(
        (status = 200, description = "Subject and its resources removed", body = SubjectDeleteRes),
        (status = 400, description = "Blank semester or name", body = ErrorBody)
    )
)]
/// Deletes a subject and cascades to its resources and their files.
///
/// Re-running the delete for an already removed subject still clears leftover resources.
pub async fn delete_subject(
    State(state): State<AppState>,
    _admin: Admin,
    Json(req): Json<SubjectReq>,
) -> ApiResult<Json<SubjectDeleteRes>> {
    let service = state.resources.clone();
    let res = blocking(move || service.delete_subject(&req.semester, &req.name)).await?;
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/api/resources/upload",
    request_body(content = ResourceUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Resource stored", body = ResourceUploadRes),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 409, description = "Video channel already recorded", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 415, description = "File is not a PDF", body = ErrorBody)
    )
)]
/// Uploads a notes/books file, or records a video channel.
pub async fn upload_resource(
    State(state): State<AppState>,
    _admin: Admin,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ResourceUploadRes>)> {
    let mut form = FormData::read(multipart).await?;
    let semester = form.required("semester")?.to_owned();
    let subject = form.required("subject")?.to_owned();
    let resource_type = parse_type(form.required("resourceType")?)?;
    let service = state.resources.clone();

    let res = if resource_type.is_file_backed() {
        let file = form.take_file()?.into_incoming();
        let input = FileResourceInput {
            semester,
            subject,
            resource_type,
        };
        blocking(move || service.upload_file(&input, file)).await?
    } else {
        let input = VideoChannelInput {
            semester,
            subject,
            channel: form.required("channel")?.to_owned(),
            topics: VideoChannelInput::split_topics(form.text("topics").unwrap_or_default()),
        };
        blocking(move || service.add_video_channel(&input)).await?
    };
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    delete,
    path = "/api/resources/delete",
    request_body = DeleteResourceReq,
    responses(
        (status = 200, description = "Resource removed", body = MessageRes),
        (status = 404, description = "No such resource", body = ErrorBody)
    )
)]
pub async fn delete_file_resource(
    State(state): State<AppState>,
    _admin: Admin,
    Json(req): Json<DeleteResourceReq>,
) -> ApiResult<Json<MessageRes>> {
    let service = state.resources.clone();
    let (semester, subject, resource_type) = (req.semester, req.subject, req.resource_type);
    let message = format!("{} for {} deleted", resource_type, subject.trim());
    blocking(move || service.delete_file_resource(&semester, &subject, resource_type)).await?;
    Ok(Json(MessageRes { message }))
}

#[utoipa::path(
    delete,
    path = "/api/resources/video",
    request_body = DeleteVideoReq,
    responses(
        (status = 200, description = "Channel removed", body = MessageRes),
        (status = 404, description = "No such channel", body = ErrorBody)
    )
)]
pub async fn delete_video_channel(
    State(state): State<AppState>,
    _admin: Admin,
    Json(req): Json<DeleteVideoReq>,
) -> ApiResult<Json<MessageRes>> {
    let service = state.resources.clone();
    let message = format!("Channel {} removed", req.channel.trim());
    blocking(move || service.delete_video_channel(&req.semester, &req.subject, &req.channel))
        .await?;
    Ok(Json(MessageRes { message }))
}
