//! Operator endpoints over stored paths.

use crate::error::{ApiResult, ErrorBody};
use crate::extract::{blocking, Admin};
use crate::AppState;
use api_shared::wire::{DiagnoseReport, FixPathsReport, FixPathsReq, NormalizeReport};
use axum::extract::State;
use axum::Json;

#[utoipa::path(
    get,
    path = "/question-papers/diagnose-paths",
    responses(
        (status = 200, description = "Per-record resolution report", body = DiagnoseReport),
        (status = 401, description = "No credentials", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
/// Reports which catalog records point at files that can be found. Read-only.
pub async fn diagnose_paths(
    State(state): State<AppState>,
    _admin: Admin,
) -> ApiResult<Json<DiagnoseReport>> {
    let service = state.repair.clone();
    Ok(Json(blocking(move || service.diagnose()).await?))
}

#[utoipa::path(
    post,
    path = "/question-papers/fix-paths",
    request_body = FixPathsReq,
    responses(
        (status = 200, description = "Per-item outcomes", body = FixPathsReport),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn fix_paths(
    State(state): State<AppState>,
    _admin: Admin,
    Json(req): Json<FixPathsReq>,
) -> ApiResult<Json<FixPathsReport>> {
    let service = state.repair.clone();
    Ok(Json(blocking(move || service.apply_fixes(&req.fixes)).await?))
}

#[utoipa::path(
    post,
    path = "/question-papers/normalize-paths",
    responses(
        (status = 200, description = "Per-record outcomes", body = NormalizeReport),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
/// Strips a leading separator from every stored path that has one.
pub async fn normalize_paths(
    State(state): State<AppState>,
    _admin: Admin,
) -> ApiResult<Json<NormalizeReport>> {
    let service = state.repair.clone();
    Ok(Json(blocking(move || service.normalize()).await?))
}
