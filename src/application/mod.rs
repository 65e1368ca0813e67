//! Conversion pipeline: preprocessing, export dispatch and the HTML to DOCX converter.

pub mod convert;
pub mod docx;
pub mod error;
pub mod export;
pub mod preprocess;
