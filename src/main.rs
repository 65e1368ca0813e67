use std::{path::PathBuf, process, sync::Arc};

use pagescribe::{
    application::{convert::ConversionService, error::AppError},
    config::{self, CliInputKind, CliOutputFormat, ConvertArgs},
    domain::types::{ConversionRequest, InputKind, OutputFormat},
    infra::{
        browser::{BrowserLauncher, ChromeLauncher},
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
    }
}

fn conversion_service(settings: &config::Settings) -> Arc<ConversionService> {
    let launcher: Arc<dyn BrowserLauncher> =
        Arc::new(ChromeLauncher::new(&settings.browser, settings.deployment));
    Arc::new(ConversionService::new(
        launcher,
        settings.browser.render_timeout,
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let max_body_bytes = usize::try_from(settings.server.max_body_bytes.get()).map_err(|_| {
        InfraError::configuration("server.max_body_bytes does not fit in memory on this platform")
    })?;

    let state = AppState {
        conversions: conversion_service(&settings),
        mode: settings.deployment,
    };
    let router = http::build_router(state, max_body_bytes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "pagescribe::serve",
        addr = %settings.server.addr,
        mode = ?settings.deployment,
        "HTTP server listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        _ = signalled_rx => {}
    }

    // In-flight conversions get a bounded window; anything still running afterwards is dropped
    // with the runtime, and each renderer session kills its browser from `Drop`.
    let drained = tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await;
    match drained {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "pagescribe::serve",
                grace_ms = settings.server.graceful_shutdown.as_millis() as u64,
                "Graceful shutdown window elapsed; abandoning in-flight requests"
            );
            server.abort();
            Ok(())
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => {
            info!(target = "pagescribe::serve", "HTTP server stopped");
            Ok(())
        }
        Ok(Err(err)) => Err(InfraError::from(err).into()),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "pagescribe::serve", error = %err, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = "pagescribe::serve", error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target = "pagescribe::serve", "Received Ctrl+C, shutting down"),
        _ = terminate => info!(target = "pagescribe::serve", "Received SIGTERM, shutting down"),
    }
}

async fn run_convert(settings: config::Settings, args: ConvertArgs) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(InfraError::from)?;

    let kind = match args.kind {
        Some(CliInputKind::Html) => InputKind::Html,
        Some(CliInputKind::Markdown) => InputKind::Markdown,
        None => InputKind::from_extension(args.input.extension().and_then(|ext| ext.to_str())),
    };
    let format = match args.format {
        CliOutputFormat::Pdf => OutputFormat::Pdf,
        CliOutputFormat::Docx => OutputFormat::Docx,
    };
    let output = args.output.unwrap_or_else(|| default_output(&args.input, format));

    let request = match kind {
        InputKind::Html => ConversionRequest::from_fields(Some(text), None, format),
        InputKind::Markdown => ConversionRequest::from_fields(None, Some(text), format),
    }?;

    let document = conversion_service(&settings).convert(request).await?;
    tokio::fs::write(&output, &document.bytes)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "pagescribe::convert",
        input = %args.input.display(),
        output = %output.display(),
        bytes = document.bytes.len(),
        "Document written"
    );
    Ok(())
}

fn default_output(input: &std::path::Path, format: OutputFormat) -> PathBuf {
    input.with_extension(format.as_str())
}
