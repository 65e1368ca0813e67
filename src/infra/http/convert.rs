use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    application::{
        convert::{ConversionService, ConvertError},
        error::ErrorReport,
    },
    config::DeploymentMode,
    domain::{
        error::ValidationError,
        types::{ConversionRequest, OutputFormat, RenderedDocument},
    },
};

use super::AppState;

const SOURCE: &str = "infra::http::convert";

/// Wire shape of `/convert` and `/preview` bodies. `outputFormat` is kept loosely typed so
/// non-string selectors fall back to PDF instead of failing the request.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConvertBody {
    html: Option<String>,
    markdown: Option<String>,
    output_format: Option<Value>,
}

impl ConvertBody {
    fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| ValidationError::MalformedBody(err.to_string()))?;
        if !value.is_object() {
            return Err(ValidationError::MalformedBody(
                "expected an object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|err| ValidationError::MalformedBody(err.to_string()))
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::from_selector(self.output_format.as_ref().and_then(Value::as_str))
    }

    fn into_request(self) -> Result<ConversionRequest, ValidationError> {
        let output_format = self.output_format();
        ConversionRequest::from_fields(self.html, self.markdown, output_format)
    }
}

#[derive(Debug, Serialize)]
struct ClientErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct FailureBody {
    error: String,
    details: FailureDetails,
}

#[derive(Debug, Serialize)]
struct FailureDetails {
    name: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

pub(super) async fn convert(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            ConversionService::record_rejection(OutputFormat::default());
            return rejection_response(rejection);
        }
    };
    let body = match ConvertBody::parse(&body) {
        Ok(body) => body,
        Err(err) => {
            ConversionService::record_rejection(OutputFormat::default());
            return validation_response(err);
        }
    };
    let format = body.output_format();
    let request = match body.into_request() {
        Ok(request) => request,
        Err(err) => {
            ConversionService::record_rejection(format);
            return validation_response(err);
        }
    };

    info!(
        target = "pagescribe::http::convert",
        input_kind = request.input_kind.as_str(),
        format = request.output_format.as_str(),
        input_bytes = request.input_text.len(),
        "Conversion request received"
    );

    match state.conversions.convert(request).await {
        Ok(document) => document_response(document),
        Err(err) => error_response(
            err,
            format!("Failed to generate {}", format.as_str().to_ascii_uppercase()),
            state.mode,
        ),
    }
}

pub(super) async fn preview(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection),
    };
    let request = match ConvertBody::parse(&body).and_then(ConvertBody::into_request) {
        Ok(request) => request,
        Err(err) => return validation_response(err),
    };

    match state
        .conversions
        .preview(request.input_kind, &request.input_text)
    {
        Ok(html) => Html(html).into_response(),
        Err(err) => error_response(err, "Failed to render preview".to_string(), state.mode),
    }
}

fn document_response(document: RenderedDocument) -> Response {
    let disposition = document.content_disposition();
    let mime = document.mime_type();
    let len = document.bytes.len();

    let mut response = (StatusCode::OK, document.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    response
}

fn validation_response(error: ValidationError) -> Response {
    debug!(
        target = "pagescribe::http::convert",
        error = %error,
        "Conversion request rejected"
    );
    let mut response = (
        StatusCode::BAD_REQUEST,
        Json(ClientErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response();
    ErrorReport::from_error(SOURCE, StatusCode::BAD_REQUEST, &error).attach(&mut response);
    response
}

/// The body could not be read, typically because it exceeds the configured size limit.
fn rejection_response(rejection: BytesRejection) -> Response {
    let status = rejection.status();
    let message = rejection.body_text();
    debug!(
        target = "pagescribe::http::convert",
        status = status.as_u16(),
        error = %message,
        "Request body rejected"
    );
    let mut response = (
        status,
        Json(ClientErrorBody {
            error: message.clone(),
        }),
    )
        .into_response();
    ErrorReport::from_message(SOURCE, status, message).attach(&mut response);
    response
}

fn error_response(error: ConvertError, public_message: String, mode: DeploymentMode) -> Response {
    if let ConvertError::Validation(err) = error {
        return validation_response(err);
    }

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let body = FailureBody {
        error: public_message,
        details: FailureDetails {
            name: error.name(),
            message: error.to_string(),
            stack: (!mode.is_production()).then(|| format!("{error:?}")),
        },
    };

    let mut response = (status, Json(body)).into_response();
    ErrorReport::from_error(SOURCE, status, &error).attach(&mut response);
    response
}
