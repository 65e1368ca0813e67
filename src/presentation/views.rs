use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::HttpError;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

const SAMPLE_HTML: &str = "<h1 style=\"color: #8B5CF6;\">Hello World</h1>\n\
<p>This is a sample HTML document.</p>\n\
<ul>\n  <li>Item 1</li>\n  <li>Item 2</li>\n  <li>Item 3</li>\n</ul>";

const SAMPLE_MARKDOWN: &str = "# Hello World\n\n\
This is a sample **Markdown** document.\n\n\
- Item 1\n- Item 2\n- Item 3\n";

/// The single-page editor: source textarea, live preview and download button.
#[derive(Template)]
#[template(path = "editor.html")]
pub struct EditorTemplate {
    pub version: &'static str,
    pub sample_html: &'static str,
    pub sample_markdown: &'static str,
}

impl Default for EditorTemplate {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            sample_html: SAMPLE_HTML,
            sample_markdown: SAMPLE_MARKDOWN,
        }
    }
}
