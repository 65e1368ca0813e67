use thiserror::Error;

/// Caller-side input problems; always surfaced as HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("HTML or Markdown content is required")]
    MissingContent,
    #[error("Provide either HTML or Markdown content, not both")]
    AmbiguousContent,
    #[error("Request body must be a JSON object: {0}")]
    MalformedBody(String),
}
