//! Question paper uploads, listing and deletion.

use crate::error::{ApiError, ApiResult, ErrorBody};
use crate::extract::{blocking, Admin, FormData};
use crate::AppState;
use api_shared::wire::{MessageRes, QuestionPaperTree, QuestionPaperUploadRes};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use portal_core::QuestionPaperInput;
use serde::Deserialize;
use utoipa::ToSchema;

/// Multipart fields of `POST /question-papers/upload`.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaperUploadForm {
    year: String,
    /// 1 to 8
    semester: u8,
    subject: String,
    exam_type: String,
    /// Register number of the uploader
    registerno: String,
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[utoipa::path(
    get,
    path = "/question-papers",
    responses(
        (status = 200, description = "Papers nested by year, semester, subject and exam type", body = QuestionPaperTree)
    )
)]
pub async fn list_question_papers(
    State(state): State<AppState>,
) -> ApiResult<Json<QuestionPaperTree>> {
    let service = state.papers.clone();
    let tree = blocking(move || service.list()).await?;
    Ok(Json(tree))
}

#[utoipa::path(
    post,
    path = "/question-papers/upload",
    request_body(content = QuestionPaperUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Paper stored", body = QuestionPaperUploadRes),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 413, description = "File too large", body = ErrorBody),
        (status = 415, description = "File is not a PDF", body = ErrorBody)
    )
)]
/// Uploads a question paper, replacing the one stored for the same key.
pub async fn upload_question_paper(
    State(state): State<AppState>,
    _admin: Admin,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<QuestionPaperUploadRes>)> {
    let mut form = FormData::read(multipart).await?;
    let semester = form.required("semester")?;
    let semester: u8 = semester
        .parse()
        .map_err(|_| ApiError::Validation(format!("semester '{}' is not a number", semester)))?;

    let input = QuestionPaperInput {
        year: form.required("year")?.to_owned(),
        semester,
        subject: form.required("subject")?.to_owned(),
        exam_type: form.required("examType")?.to_owned(),
        uploaded_by: form.required("registerno")?.to_owned(),
    };
    let file = form.take_file()?.into_incoming();

    let service = state.papers.clone();
    let res = blocking(move || service.upload(&input, file)).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    delete,
    path = "/question-papers/{id}",
    params(("id" = String, Path, description = "Catalog id")),
    responses(
        (status = 200, description = "Paper removed", body = MessageRes),
        (status = 404, description = "No such paper", body = ErrorBody)
    )
)]
pub async fn delete_question_paper(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageRes>> {
    let service = state.papers.clone();
    blocking(move || service.delete(&id)).await?;
    Ok(Json(MessageRes {
        message: "Question paper deleted successfully".into(),
    }))
}
