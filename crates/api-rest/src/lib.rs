//! # API REST
//!
//! REST API for the resource portal.
//!
//! Handles:
//! - HTTP endpoints with axum, including multipart uploads and file downloads
//! - The admin capability check on mutating endpoints
//! - OpenAPI/Swagger documentation
//!
//! Catalog and file logic lives in `portal-core`; handlers move it onto the blocking pool.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
mod files;
mod maintenance;
mod question_papers;
mod resources;

use api_shared::wire;
use api_shared::{Authenticator, HealthService};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use portal_core::{
    CatalogResult, CatalogStore, CoreConfig, DownloadService, QuestionPaperService,
    RepairService, ResourceService,
};
use portal_files::Ingestor;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{ApiError, ApiResult, ErrorBody};

/// Request body ceiling: the largest upload category plus room for the other form fields.
pub const MAX_REQUEST_BODY_BYTES: usize = 11 * 1024 * 1024;

/// Application state for the REST API server
///
/// Services are built once at startup over the shared configuration and catalog store.
#[derive(Clone)]
pub struct AppState {
    pub resources: Arc<ResourceService>,
    pub papers: Arc<QuestionPaperService>,
    pub downloads: Arc<DownloadService>,
    pub repair: Arc<RepairService>,
    /// Stores event banners, which have no catalog record
    pub banners: Arc<Ingestor>,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    /// Builds every service over the same storage root and catalog store.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogError` if the storage root cannot be used.
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<dyn CatalogStore>,
        auth: Arc<dyn Authenticator>,
    ) -> CatalogResult<Self> {
        Ok(Self {
            resources: Arc::new(ResourceService::new(cfg.clone(), store.clone())?),
            papers: Arc::new(QuestionPaperService::new(cfg.clone(), store.clone())?),
            downloads: Arc::new(DownloadService::new(cfg.clone(), store.clone())),
            repair: Arc::new(RepairService::new(cfg.clone(), store)?),
            banners: Arc::new(Ingestor::new(cfg.storage_root())?),
            auth,
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        resources::semester_overview,
        resources::list_by_type,
        resources::subject_names,
        resources::add_subject,
        resources::delete_subject,
        resources::upload_resource,
        resources::delete_file_resource,
        resources::delete_video_channel,
        files::download_resource,
        files::download_question_paper,
        files::upload_event_banner,
        question_papers::list_question_papers,
        question_papers::upload_question_paper,
        question_papers::delete_question_paper,
        maintenance::diagnose_paths,
        maintenance::fix_paths,
        maintenance::normalize_paths,
    ),
    components(schemas(
        ErrorBody,
        resources::ResourceUploadForm,
        question_papers::QuestionPaperUploadForm,
        files::EventBannerForm,
        wire::HealthRes,
        wire::MessageRes,
        wire::VideoChannel,
        wire::SemesterOverview,
        wire::FileEntry,
        wire::TypeEntries,
        wire::TypeListing,
        wire::SubjectsRes,
        wire::SubjectReq,
        wire::SubjectDeleteRes,
        wire::DeleteResourceReq,
        wire::DeleteVideoReq,
        wire::ResourceUploadRes,
        wire::QuestionPaperUploadRes,
        wire::PaperEntry,
        wire::QuestionPaperTree,
        wire::EventBannerRes,
        wire::RecordKind,
        wire::PathDiagnosis,
        wire::DiagnoseReport,
        wire::PathFix,
        wire::FixPathsReq,
        wire::FixOutcome,
        wire::FixPathsReport,
        wire::NormalizeStatus,
        wire::NormalizeOutcome,
        wire::NormalizeReport,
    ))
)]
pub struct ApiDoc;

/// Builds the full router: every endpoint, Swagger UI and the OpenAPI document.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/resources/:semester", get(resources::semester_overview))
        .route("/resources/:semester/:type", get(resources::list_by_type))
        .route("/api/subjects/:semester", get(resources::subject_names))
        .route(
            "/api/subjects",
            post(resources::add_subject).delete(resources::delete_subject),
        )
        .route("/api/resources/upload", post(resources::upload_resource))
        .route(
            "/api/resources/delete",
            delete(resources::delete_file_resource),
        )
        .route(
            "/api/resources/video",
            delete(resources::delete_video_channel),
        )
        .route("/resource/download/:id", get(files::download_resource))
        .route("/question-papers", get(question_papers::list_question_papers))
        .route(
            "/question-papers/upload",
            post(question_papers::upload_question_paper),
        )
        .route(
            "/question-papers/download/:id",
            get(files::download_question_paper),
        )
        .route(
            "/question-papers/diagnose-paths",
            get(maintenance::diagnose_paths),
        )
        .route("/question-papers/fix-paths", post(maintenance::fix_paths))
        .route(
            "/question-papers/normalize-paths",
            post(maintenance::normalize_paths),
        )
        .route(
            "/question-papers/:id",
            delete(question_papers::delete_question_paper),
        )
        .route("/api/uploads/event-banner", post(files::upload_event_banner))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = wire::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health() -> Json<wire::HealthRes> {
    Json(HealthService::check_health())
}
