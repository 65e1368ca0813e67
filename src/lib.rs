//! HTML and Markdown to PDF/DOCX conversion service.
//!
//! PDF output is printed by a headless Chromium process launched per request; DOCX output is
//! produced in-process. The HTTP surface lives in [`infra::http`].

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
