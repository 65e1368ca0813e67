use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{
        network::{EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent},
        page::PrintToPdfParams,
    },
};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{BrowserSettings, DeploymentMode};

use super::{BrowserLauncher, BrowserProcess, PdfLayout, RenderError, wait_for_network_idle};

/// Flags for the bundled minimal Chromium used in production hosting, where the process runs
/// in a constrained container without a GPU or a large `/dev/shm`. `--no-zygote` requires the
/// sandbox to be off, so production launches always pass `--no-sandbox` alongside these.
const BUNDLED_CHROMIUM_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-software-rasterizer",
    "--font-render-hinting=none",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--no-zygote",
    "--single-process",
];

/// Launches one Chromium process per request through the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    args: Vec<String>,
    no_sandbox: bool,
    launch_timeout: Duration,
    network_idle: Duration,
}

impl ChromeLauncher {
    /// Production uses the bundled binary with container flags and no sandbox; development uses
    /// the configured local executable, or lets chromiumoxide locate an installed
    /// Chrome/Chromium, and keeps the sandbox unless `no_sandbox` is set.
    pub fn new(settings: &BrowserSettings, mode: DeploymentMode) -> Self {
        let (executable, args, no_sandbox) = match mode {
            DeploymentMode::Production => (
                Some(settings.bundled_executable_path.clone()),
                BUNDLED_CHROMIUM_ARGS
                    .iter()
                    .map(|arg| (*arg).to_string())
                    .collect(),
                true,
            ),
            DeploymentMode::Development => (
                settings.executable_path.clone(),
                Vec::new(),
                settings.no_sandbox,
            ),
        };

        Self {
            executable,
            args,
            no_sandbox,
            launch_timeout: settings.launch_timeout,
            network_idle: settings.network_idle,
        }
    }

    pub fn executable(&self) -> Option<&PathBuf> {
        self.executable.as_ref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn sandboxed(&self) -> bool {
        !self.no_sandbox
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, RenderError> {
        // Each process gets a private profile so concurrent launches never share a profile lock.
        let profile = tempfile::Builder::new()
            .prefix("pagescribe-chrome-")
            .tempdir()
            .map_err(|err| RenderError::launch(format!("failed to create profile dir: {err}")))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .launch_timeout(self.launch_timeout)
            .args(self.args.iter().cloned());
        if let Some(executable) = self.executable.as_ref() {
            builder = builder.chrome_executable(executable);
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(RenderError::launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| RenderError::launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(
                        target = "pagescribe::browser::chrome",
                        error = %err,
                        "DevTools handler reported an error"
                    );
                }
            }
        });

        Ok(Box::new(ChromeProcess {
            browser: Some(browser),
            handler_task,
            network_idle: self.network_idle,
            _profile: profile,
        }))
    }
}

struct ChromeProcess {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
    network_idle: Duration,
    _profile: TempDir,
}

#[async_trait]
impl BrowserProcess for ChromeProcess {
    async fn print_pdf(&mut self, html: &str, layout: &PdfLayout) -> Result<Vec<u8>, RenderError> {
        let browser = self.browser.as_ref().ok_or(RenderError::Closed)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| RenderError::protocol(err.to_string()))?;

        let result = load_and_print(&page, html, layout, self.network_idle).await;

        if let Err(err) = page.close().await {
            debug!(
                target = "pagescribe::browser::chrome",
                error = %err,
                "Failed to close page; the browser shutdown will reclaim it"
            );
        }

        result
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| RenderError::protocol(err.to_string()));

        if closed.is_ok()
            && let Err(err) = browser.wait().await
        {
            warn!(
                target = "pagescribe::browser::chrome",
                error = %err,
                "Failed to reap browser process"
            );
        }
        self.handler_task.abort();

        if closed.is_err() {
            // Hand the browser back so `terminate` can kill it.
            self.browser = Some(browser);
        }
        closed
    }

    fn terminate(&mut self) {
        self.handler_task.abort();
        // Dropping a chromiumoxide `Browser` kills its child process.
        drop(self.browser.take());
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn load_and_print(
    page: &Page,
    html: &str,
    layout: &PdfLayout,
    network_idle: Duration,
) -> Result<Vec<u8>, RenderError> {
    let protocol = |err: chromiumoxide::error::CdpError| RenderError::protocol(err.to_string());

    // Subscribe before loading so requests issued while parsing are observed.
    let started = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(protocol)?
        .map(|event| event.request_id.inner().clone());
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(protocol)?
        .map(|event| event.request_id.inner().clone());
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(protocol)?
        .map(|event| event.request_id.inner().clone());

    page.set_content(html).await.map_err(protocol)?;
    wait_for_network_idle(started, finished, failed, network_idle).await;

    page.pdf(print_params(layout)).await.map_err(protocol)
}

fn print_params(layout: &PdfLayout) -> PrintToPdfParams {
    let margin = layout.margin_in();
    PrintToPdfParams {
        print_background: Some(layout.print_background),
        paper_width: Some(layout.paper_width_in),
        paper_height: Some(layout.paper_height_in),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..Default::default()
    }
}
