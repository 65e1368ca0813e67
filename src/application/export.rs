use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, error};

use crate::{
    application::docx::{DocxError, html_to_docx},
    domain::types::{OutputFormat, RenderedDocument},
    infra::browser::{BrowserLauncher, RenderError, RendererSession},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Docx(#[from] DocxError),
    #[error("document conversion task failed: {message}")]
    Task { message: String },
}

/// Dispatches preprocessed HTML to the PDF renderer or the DOCX converter.
pub struct DocumentExporter {
    launcher: Arc<dyn BrowserLauncher>,
    render_timeout: Duration,
}

impl DocumentExporter {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, render_timeout: Duration) -> Self {
        Self {
            launcher,
            render_timeout,
        }
    }

    pub async fn export(
        &self,
        html: String,
        format: OutputFormat,
    ) -> Result<RenderedDocument, ExportError> {
        let bytes = match format {
            OutputFormat::Pdf => self.print_pdf(&html).await?,
            OutputFormat::Docx => convert_docx(html).await?,
        };
        Ok(RenderedDocument::new(bytes, format))
    }

    async fn print_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let mut session = RendererSession::open(self.launcher.as_ref(), self.render_timeout).await?;

        let rendered = session.render_pdf(html).await;
        if let Err(err) = &rendered {
            error!(
                target = "pagescribe::application::export",
                error = %err,
                "PDF rendering failed"
            );
        }
        // Released before the outcome is inspected so every path closes exactly once.
        session.close().await;

        rendered
    }
}

async fn convert_docx(html: String) -> Result<Vec<u8>, ExportError> {
    let html_bytes = html.len();
    let bytes = tokio::task::spawn_blocking(move || html_to_docx(&html))
        .await
        .map_err(|err| ExportError::Task {
            message: err.to_string(),
        })??;

    debug!(
        target = "pagescribe::application::export",
        html_bytes,
        docx_bytes = bytes.len(),
        "DOCX document packaged"
    );
    Ok(bytes)
}
