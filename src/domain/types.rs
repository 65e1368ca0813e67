//! Request-scoped conversion types shared by every layer.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Declared kind of the caller-supplied text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Html,
    Markdown,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Html => "html",
            InputKind::Markdown => "markdown",
        }
    }

    /// Infer the kind from a file extension; anything that is not Markdown is treated as HTML.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension.map(|ext| ext.to_ascii_lowercase()) {
            Some(ext) if matches!(ext.as_str(), "md" | "markdown" | "mdown" | "mkd") => {
                InputKind::Markdown
            }
            _ => InputKind::Html,
        }
    }
}

/// Output container requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Docx,
}

impl OutputFormat {
    /// Resolve a loosely-typed selector. Absent or unrecognized selectors fall back to PDF.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("docx") => OutputFormat::Docx,
            _ => OutputFormat::Pdf,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn disposition(self) -> Disposition {
        match self {
            OutputFormat::Pdf => Disposition::Inline,
            OutputFormat::Docx => Disposition::Attachment,
        }
    }

    pub fn suggested_filename(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "generated.pdf",
            OutputFormat::Docx => "generated.docx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// A validated conversion request: exactly one input kind with non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input_kind: InputKind,
    pub input_text: String,
    pub output_format: OutputFormat,
}

impl ConversionRequest {
    /// Build a request from the two optional text fields of the wire body.
    ///
    /// Empty strings count as absent, so `{"html": ""}` is rejected as missing content.
    pub fn from_fields(
        html: Option<String>,
        markdown: Option<String>,
        output_format: OutputFormat,
    ) -> Result<Self, ValidationError> {
        let html = html.filter(|value| !value.is_empty());
        let markdown = markdown.filter(|value| !value.is_empty());

        let (input_kind, input_text) = match (html, markdown) {
            (Some(html), None) => (InputKind::Html, html),
            (None, Some(markdown)) => (InputKind::Markdown, markdown),
            (None, None) => return Err(ValidationError::MissingContent),
            (Some(_), Some(_)) => return Err(ValidationError::AmbiguousContent),
        };

        Ok(Self {
            input_kind,
            input_text,
            output_format,
        })
    }
}

/// Finished file bytes plus the metadata the HTTP layer turns into headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

impl RenderedDocument {
    pub fn new(bytes: Vec<u8>, format: OutputFormat) -> Self {
        Self { bytes, format }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn suggested_filename(&self) -> &'static str {
        self.format.suggested_filename()
    }

    /// Value for the `Content-Disposition` header.
    pub fn content_disposition(&self) -> String {
        format!(
            "{}; filename=\"{}\"",
            self.format.disposition().as_str(),
            self.suggested_filename()
        )
    }
}
