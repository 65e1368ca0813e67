//! HTTP surface: the conversion endpoint, its diagnostic echo and the editor UI.

mod convert;
mod diagnostics;
mod middleware;
mod ui;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::{application::convert::ConversionService, config::DeploymentMode};

/// Shared by every request. Holds no per-request state; renderer sessions are created inside
/// each handler invocation.
#[derive(Clone)]
pub struct AppState {
    pub conversions: Arc<ConversionService>,
    pub mode: DeploymentMode,
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/convert", post(convert::convert))
        .route("/api/generate-pdf", post(convert::convert))
        .route("/preview", post(convert::preview))
        .route("/test", get(diagnostics::test_get).post(diagnostics::test_post))
        .route(
            "/api/test",
            get(diagnostics::test_get).post(diagnostics::test_post),
        )
        .route("/_health", get(diagnostics::health))
        .route("/", get(ui::editor))
        .route("/static/{*path}", get(crate::infra::assets::serve_static))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
