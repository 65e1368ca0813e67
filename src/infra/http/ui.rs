use axum::{http::StatusCode, response::Response};

use crate::presentation::views::{EditorTemplate, render_template_response};

pub(super) async fn editor() -> Response {
    render_template_response(EditorTemplate::default(), StatusCode::OK)
}
