//! Shared fixtures: a browser launcher that never starts a real process.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Method, Request, Response, header},
};
use http_body_util::BodyExt;
use pagescribe::{
    application::convert::ConversionService,
    config::DeploymentMode,
    infra::{
        browser::{BrowserLauncher, BrowserProcess, PdfLayout, RenderError},
        http::{AppState, build_router},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Print,
    /// Prints after a short delay so concurrent requests overlap.
    SlowPrint,
    RefuseLaunch,
    Hang,
    Crash,
}

#[derive(Debug, Default)]
pub struct Counters {
    launched: AtomicUsize,
    closed: AtomicUsize,
    terminated: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl Counters {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Highest number of processes alive at the same time.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    fn released(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Every launched process was released exactly once, one way or the other.
    pub fn assert_balanced(&self) {
        assert_eq!(
            self.launched(),
            self.closed() + self.terminated(),
            "browser processes leaked or released twice"
        );
    }
}

pub struct FakeLauncher {
    behaviour: Behaviour,
    counters: Arc<Counters>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, RenderError> {
        if self.behaviour == Behaviour::RefuseLaunch {
            return Err(RenderError::launch("executable not found: /opt/chromium/chrome"));
        }
        let id = self.counters.launched.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(FakeProcess {
            id,
            behaviour: self.behaviour,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeProcess {
    id: usize,
    behaviour: Behaviour,
    counters: Arc<Counters>,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    async fn print_pdf(&mut self, html: &str, layout: &PdfLayout) -> Result<Vec<u8>, RenderError> {
        match self.behaviour {
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Crash => Err(RenderError::protocol("target crashed")),
            Behaviour::SlowPrint => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(self.document(html, layout))
            }
            Behaviour::Print | Behaviour::RefuseLaunch => Ok(self.document(html, layout)),
        }
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.counters.released();
        Ok(())
    }

    fn terminate(&mut self) {
        self.counters.terminated.fetch_add(1, Ordering::SeqCst);
        self.counters.released();
    }
}

impl FakeProcess {
    fn document(&self, html: &str, layout: &PdfLayout) -> Vec<u8> {
        format!(
            "%PDF-1.7\n% process {} printed {} bytes on {}x{}in\n%%EOF",
            self.id,
            html.len(),
            layout.paper_width_in,
            layout.paper_height_in
        )
        .into_bytes()
    }
}

pub struct Harness {
    pub router: Router,
    pub counters: Arc<Counters>,
}

impl Harness {
    pub fn new(behaviour: Behaviour) -> Self {
        Self::with(behaviour, DeploymentMode::Development, Duration::from_secs(30))
    }

    pub fn with(behaviour: Behaviour, mode: DeploymentMode, render_timeout: Duration) -> Self {
        let counters = Arc::new(Counters::default());
        let launcher: Arc<dyn BrowserLauncher> = Arc::new(FakeLauncher {
            behaviour,
            counters: Arc::clone(&counters),
        });
        let state = AppState {
            conversions: Arc::new(ConversionService::new(launcher, render_timeout)),
            mode,
        };
        Self {
            router: build_router(state, 1024 * 1024),
            counters,
        }
    }
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
