use std::time::{Duration, Instant};

use metrics::{gauge, histogram};
use tracing::{info, warn};

use super::{BrowserLauncher, BrowserProcess, PdfLayout, RenderError};

const ACTIVE_SESSIONS_GAUGE: &str = "pagescribe_browser_sessions_active";

/// Request-scoped handle over one browser process.
///
/// Call [`RendererSession::close`] on every path that has a chance to await. If the session is
/// dropped while still open (the request future was cancelled, or something panicked) the
/// process is terminated synchronously from `Drop`.
pub struct RendererSession {
    process: Option<Box<dyn BrowserProcess>>,
    layout: PdfLayout,
    render_timeout: Duration,
    opened_at: Instant,
}

impl RendererSession {
    /// Launch a browser process for the current request.
    pub async fn open(
        launcher: &dyn BrowserLauncher,
        render_timeout: Duration,
    ) -> Result<Self, RenderError> {
        let started_at = Instant::now();
        let process = launcher.launch().await?;
        gauge!(ACTIVE_SESSIONS_GAUGE).increment(1.0);

        info!(
            target = "pagescribe::browser::session",
            op = "open",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Browser process launched"
        );

        Ok(Self {
            process: Some(process),
            layout: PdfLayout::A4,
            render_timeout,
            opened_at: Instant::now(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.process.is_some()
    }

    /// Load `html`, wait for the network to settle and return the printed PDF.
    pub async fn render_pdf(&mut self, html: &str) -> Result<Vec<u8>, RenderError> {
        let budget = self.render_timeout;
        let layout = self.layout;
        let process = self.process.as_mut().ok_or(RenderError::Closed)?;

        let started_at = Instant::now();
        let outcome = tokio::time::timeout(budget, process.print_pdf(html, &layout)).await;
        histogram!("pagescribe_render_ms").record(started_at.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(Ok(bytes)) => {
                info!(
                    target = "pagescribe::browser::session",
                    op = "render_pdf",
                    html_bytes = html.len(),
                    pdf_bytes = bytes.len(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "PDF printed"
                );
                Ok(bytes)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(RenderError::Timeout { budget }),
        }
    }

    /// Shut the browser down. Safe to call repeatedly; failures are logged, never returned, so
    /// an error already being propagated by the caller is not replaced.
    pub async fn close(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        gauge!(ACTIVE_SESSIONS_GAUGE).decrement(1.0);

        match process.close().await {
            Ok(()) => info!(
                target = "pagescribe::browser::session",
                op = "close",
                lifetime_ms = self.opened_at.elapsed().as_millis() as u64,
                "Browser process closed"
            ),
            Err(err) => {
                warn!(
                    target = "pagescribe::browser::session",
                    op = "close",
                    error = %err,
                    "Graceful browser shutdown failed; killing process"
                );
                process.terminate();
            }
        }
    }
}

impl Drop for RendererSession {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            gauge!(ACTIVE_SESSIONS_GAUGE).decrement(1.0);
            warn!(
                target = "pagescribe::browser::session",
                op = "drop",
                lifetime_ms = self.opened_at.elapsed().as_millis() as u64,
                "Renderer session dropped while open; terminating browser process"
            );
            process.terminate();
        }
    }
}
