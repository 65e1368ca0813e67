//! Liveness and request-echo endpoints used to check that the service is reachable.

use axum::{
    Json,
    body::Bytes,
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::application::error::ErrorReport;

const SOURCE: &str = "infra::http::diagnostics";

pub(super) async fn test_get() -> Json<Value> {
    Json(json!({ "message": "API Test endpoint is alive (GET request)!" }))
}

pub(super) async fn test_post(body: Result<Bytes, BytesRejection>) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            let message = rejection.body_text();
            let mut response = (
                status,
                Json(json!({
                    "message": "API Test endpoint reached, but failed to read request body.",
                    "error": message.clone(),
                })),
            )
                .into_response();
            ErrorReport::from_message(SOURCE, status, message).attach(&mut response);
            return response;
        }
    };

    match serde_json::from_slice::<Value>(&body) {
        Ok(received) => Json(json!({
            "message": "API Test endpoint reached successfully!",
            "receivedData": received,
        }))
        .into_response(),
        Err(err) => {
            let mut response = (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "message": "API Test endpoint reached, but failed to parse request body.",
                    "error": err.to_string(),
                })),
            )
                .into_response();
            ErrorReport::from_error(SOURCE, StatusCode::BAD_REQUEST, &err)
                .attach(&mut response);
            response
        }
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
