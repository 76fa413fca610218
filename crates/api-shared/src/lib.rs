//! # API Shared
//!
//! Shared definitions for the resource portal APIs.
//!
//! Contains:
//! - Request/response bodies (`wire` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//! - The caller capability check (`auth` module)
//!
//! Used by `portal-core` for its report types and by `api-rest` for the HTTP surface.

pub mod auth;
pub mod health;
pub mod wire;

pub use auth::{AuthError, Authenticator, Caller, HeaderAuthenticator};
pub use health::HealthService;
pub use wire::*;
