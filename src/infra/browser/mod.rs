//! Headless browser integration: process launch, request-scoped sessions, PDF printing.
//!
//! The conversion pipeline only sees [`BrowserLauncher`] and [`RendererSession`]. The
//! Chromium-backed launcher lives in [`chrome`]; tests substitute their own launcher.

mod chrome;
mod idle;
mod session;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use chrome::ChromeLauncher;
pub use idle::wait_for_network_idle;
pub use session::RendererSession;

const CSS_PIXELS_PER_INCH: f64 = 96.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {message}")]
    Launch { message: String },
    #[error("page did not reach network idle within {} ms", .budget.as_millis())]
    Timeout { budget: Duration },
    #[error("browser protocol failure: {message}")]
    Protocol { message: String },
    #[error("renderer session is already closed")]
    Closed,
}

impl RenderError {
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Starts browser processes. One call per conversion request; implementations must not share
/// processes between calls.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, RenderError>;
}

/// A running browser process owned by exactly one [`RendererSession`].
#[async_trait]
pub trait BrowserProcess: Send {
    /// Load `html` into a fresh page, wait for network idle and print the page.
    async fn print_pdf(&mut self, html: &str, layout: &PdfLayout) -> Result<Vec<u8>, RenderError>;

    /// Gracefully shut the process down and reap it.
    async fn close(&mut self) -> Result<(), RenderError>;

    /// Kill the process without awaiting; used from `Drop` when a session is abandoned.
    fn terminate(&mut self);
}

/// Fixed print layout. Not configurable per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_px: f64,
    pub print_background: bool,
}

impl PdfLayout {
    pub const A4: PdfLayout = PdfLayout {
        paper_width_in: 8.27,
        paper_height_in: 11.7,
        margin_px: 20.0,
        print_background: true,
    };

    pub fn margin_in(&self) -> f64 {
        self.margin_px / CSS_PIXELS_PER_INCH
    }
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::A4
    }
}
