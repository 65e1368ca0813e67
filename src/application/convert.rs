use std::{sync::Arc, time::Duration};

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        export::{DocumentExporter, ExportError},
        preprocess::{PreprocessError, Preprocessor},
    },
    domain::{
        error::ValidationError,
        types::{ConversionRequest, InputKind, OutputFormat, RenderedDocument},
    },
    infra::browser::{BrowserLauncher, RenderError},
};

const CONVERSIONS_TOTAL: &str = "pagescribe_conversions_total";

/// Pipeline failures, grouped by how the HTTP layer reports them.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Launch(RenderError),
    #[error(transparent)]
    RenderTimeout(RenderError),
    #[error("{origin}: {message}")]
    Conversion {
        origin: &'static str,
        message: String,
    },
}

impl ConvertError {
    /// Stable error class exposed to clients as `details.name`.
    pub fn name(&self) -> &'static str {
        match self {
            ConvertError::Validation(_) => "ValidationError",
            ConvertError::Launch(_) => "LaunchError",
            ConvertError::RenderTimeout(_) => "RenderTimeoutError",
            ConvertError::Conversion { .. } => "ConversionError",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ConvertError::Validation(_))
    }
}

impl From<RenderError> for ConvertError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Launch { .. } => ConvertError::Launch(error),
            RenderError::Timeout { .. } => ConvertError::RenderTimeout(error),
            RenderError::Protocol { message } => ConvertError::Conversion {
                origin: "BrowserProtocolError",
                message,
            },
            RenderError::Closed => ConvertError::Conversion {
                origin: "BrowserProtocolError",
                message: error.to_string(),
            },
        }
    }
}

impl From<PreprocessError> for ConvertError {
    fn from(error: PreprocessError) -> Self {
        match error {
            PreprocessError::Validation(err) => ConvertError::Validation(err),
            PreprocessError::Markdown { message } => ConvertError::Conversion {
                origin: "MarkdownError",
                message,
            },
        }
    }
}

impl From<ExportError> for ConvertError {
    fn from(error: ExportError) -> Self {
        match error {
            ExportError::Render(err) => err.into(),
            ExportError::Docx(err) => ConvertError::Conversion {
                origin: "DocxError",
                message: err.to_string(),
            },
            ExportError::Task { message } => ConvertError::Conversion {
                origin: "DocxError",
                message,
            },
        }
    }
}

/// Preprocess then export. One instance is shared by every request; it holds no per-request
/// state.
pub struct ConversionService {
    preprocessor: Preprocessor,
    exporter: DocumentExporter,
}

impl ConversionService {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, render_timeout: Duration) -> Self {
        Self {
            preprocessor: Preprocessor::new(),
            exporter: DocumentExporter::new(launcher, render_timeout),
        }
    }

    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<RenderedDocument, ConvertError> {
        let format = request.output_format;
        let input_kind = request.input_kind;

        let outcome = self.run(request).await;

        let label = match &outcome {
            Ok(document) => {
                info!(
                    target = "pagescribe::application::convert",
                    input_kind = input_kind.as_str(),
                    format = format.as_str(),
                    bytes = document.bytes.len(),
                    "Conversion completed"
                );
                "ok"
            }
            Err(err) if err.is_client_error() => "invalid",
            Err(err) => {
                warn!(
                    target = "pagescribe::application::convert",
                    input_kind = input_kind.as_str(),
                    format = format.as_str(),
                    error_name = err.name(),
                    error = %err,
                    "Conversion failed"
                );
                "error"
            }
        };
        counter!(CONVERSIONS_TOTAL, "format" => format.as_str(), "outcome" => label).increment(1);

        outcome
    }

    async fn run(&self, request: ConversionRequest) -> Result<RenderedDocument, ConvertError> {
        let html = self
            .preprocessor
            .to_html(request.input_kind, &request.input_text)?;
        let document = self.exporter.export(html, request.output_format).await?;
        Ok(document)
    }

    /// Count a request rejected before it reached the pipeline.
    pub fn record_rejection(format: OutputFormat) {
        counter!(CONVERSIONS_TOTAL, "format" => format.as_str(), "outcome" => "invalid")
            .increment(1);
    }

    /// The HTML the exporters would receive, for the editor preview.
    pub fn preview(&self, kind: InputKind, text: &str) -> Result<String, ConvertError> {
        Ok(self.preprocessor.to_html(kind, text)?)
    }
}
