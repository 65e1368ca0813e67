//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    BrowserOverrides, CliArgs, CliInputKind, CliOutputFormat, Command, ConvertArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pagescribe";
const ENV_PREFIX: &str = "PAGESCRIBE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_BUNDLED_BROWSER_PATH: &str = "/opt/chromium/chrome";
const DEFAULT_BROWSER_LAUNCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_BROWSER_RENDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NETWORK_IDLE_MILLIS: u64 = 500;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub deployment: DeploymentMode,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub max_body_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Selects the browser binary and how much diagnostic detail error responses carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    pub fn is_production(self) -> bool {
        matches!(self, DeploymentMode::Production)
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DeploymentMode::Development),
            "production" | "prod" => Ok(DeploymentMode::Production),
            other => Err(format!(
                "unknown mode `{other}` (expected development|production)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub executable_path: Option<PathBuf>,
    pub bundled_executable_path: PathBuf,
    pub no_sandbox: bool,
    pub launch_timeout: Duration,
    pub render_timeout: Duration,
    pub network_idle: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Convert(args)) => raw.apply_browser_overrides(&args.browser),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    deployment: RawDeploymentSettings,
    browser: RawBrowserSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(bytes) = overrides.server_max_body_bytes {
            self.server.max_body_bytes = Some(bytes);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_browser_overrides(&overrides.browser);
    }

    fn apply_browser_overrides(&mut self, overrides: &BrowserOverrides) {
        if let Some(mode) = overrides.deployment_mode.as_ref() {
            self.deployment.mode = Some(mode.clone());
        }
        if let Some(path) = overrides.executable_path.as_ref() {
            self.browser.executable_path = Some(path.clone());
        }
        if let Some(path) = overrides.bundled_executable_path.as_ref() {
            self.browser.bundled_executable_path = Some(path.clone());
        }
        if let Some(no_sandbox) = overrides.no_sandbox {
            self.browser.no_sandbox = Some(no_sandbox);
        }
        if let Some(seconds) = overrides.launch_timeout_seconds {
            self.browser.launch_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.render_timeout_seconds {
            self.browser.render_timeout_seconds = Some(seconds);
        }
        if let Some(millis) = overrides.network_idle_millis {
            self.browser.network_idle_millis = Some(millis);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            deployment,
            browser,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let deployment = build_deployment_mode(deployment)?;
        let browser = build_browser_settings(browser)?;

        Ok(Self {
            server,
            logging,
            deployment,
            browser,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_duration(
        graceful_secs,
        "server.graceful_shutdown_seconds",
        Duration::from_secs,
    )?;

    let max_body_value = server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
    let max_body_bytes = NonZeroU64::new(max_body_value)
        .ok_or_else(|| LoadError::invalid("server.max_body_bytes", "must be greater than zero"))?;
    usize::try_from(max_body_value).map_err(|_| {
        LoadError::invalid(
            "server.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        max_body_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_deployment_mode(deployment: RawDeploymentSettings) -> Result<DeploymentMode, LoadError> {
    match deployment.mode {
        Some(mode) => {
            DeploymentMode::from_str(&mode).map_err(|reason| LoadError::invalid("deployment.mode", reason))
        }
        None => Ok(DeploymentMode::default()),
    }
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let executable_path = browser
        .executable_path
        .filter(|path| !path.as_os_str().is_empty());
    let bundled_executable_path = browser
        .bundled_executable_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLED_BROWSER_PATH));

    let launch_timeout = positive_duration(
        browser
            .launch_timeout_seconds
            .unwrap_or(DEFAULT_BROWSER_LAUNCH_TIMEOUT_SECS),
        "browser.launch_timeout_seconds",
        Duration::from_secs,
    )?;
    let render_timeout = positive_duration(
        browser
            .render_timeout_seconds
            .unwrap_or(DEFAULT_BROWSER_RENDER_TIMEOUT_SECS),
        "browser.render_timeout_seconds",
        Duration::from_secs,
    )?;
    let network_idle = positive_duration(
        browser
            .network_idle_millis
            .unwrap_or(DEFAULT_NETWORK_IDLE_MILLIS),
        "browser.network_idle_millis",
        Duration::from_millis,
    )?;

    if network_idle >= render_timeout {
        return Err(LoadError::invalid(
            "browser.network_idle_millis",
            "quiet window must be shorter than the render timeout",
        ));
    }

    Ok(BrowserSettings {
        executable_path,
        bundled_executable_path,
        no_sandbox: browser.no_sandbox.unwrap_or(false),
        launch_timeout,
        render_timeout,
        network_idle,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDeploymentSettings {
    mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    executable_path: Option<PathBuf>,
    bundled_executable_path: Option<PathBuf>,
    no_sandbox: Option<bool>,
    launch_timeout_seconds: Option<u64>,
    render_timeout_seconds: Option<u64>,
    network_idle_millis: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_duration(
    value: u64,
    key: &'static str,
    unit: fn(u64) -> Duration,
) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(unit(value))
}
