//! Turns caller input into the single HTML string the exporters consume.

use comrak::{Arena, format_html, options::Options, parse_document};
use thiserror::Error;

use crate::domain::{error::ValidationError, types::InputKind};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("markdown conversion failed: {message}")]
    Markdown { message: String },
}

/// Markdown goes through Comrak; HTML is passed through untouched.
///
/// HTML is deliberately not sanitised: callers are trusted with their own markup, and the
/// renderer sees exactly what they submitted.
pub struct Preprocessor {
    options: Options<'static>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            options: markdown_options(),
        }
    }

    pub fn to_html(&self, kind: InputKind, text: &str) -> Result<String, PreprocessError> {
        if text.is_empty() {
            return Err(ValidationError::MissingContent.into());
        }

        match kind {
            InputKind::Html => Ok(text.to_string()),
            InputKind::Markdown => self.render_markdown(text),
        }
    }

    fn render_markdown(&self, markdown: &str) -> Result<String, PreprocessError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| PreprocessError::Markdown {
            message: err.to_string(),
        })?;
        Ok(html)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    // Raw HTML embedded in Markdown is kept, matching the HTML input path.
    render.r#unsafe = true;

    options
}
