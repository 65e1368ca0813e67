use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pagescribe binary.
#[derive(Debug, Parser)]
#[command(
    name = "pagescribe",
    version,
    about = "HTML/Markdown to PDF/DOCX conversion service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGESCRIBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the conversion HTTP service.
    Serve(Box<ServeArgs>),
    /// Convert a single file without starting the HTTP service.
    Convert(ConvertArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowserOverrides {
    /// Deployment mode (development|production).
    #[arg(long = "deployment-mode", value_name = "MODE")]
    pub deployment_mode: Option<String>,

    /// Locally installed browser executable used in development mode.
    #[arg(long = "browser-executable-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub executable_path: Option<PathBuf>,

    /// Bundled browser executable used in production mode.
    #[arg(long = "browser-bundled-executable-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub bundled_executable_path: Option<PathBuf>,

    /// Disable the browser sandbox (required in some containers).
    #[arg(
        long = "browser-no-sandbox",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub no_sandbox: Option<bool>,

    /// Override the browser launch timeout.
    #[arg(long = "browser-launch-timeout-seconds", value_name = "SECONDS")]
    pub launch_timeout_seconds: Option<u64>,

    /// Override the budget for loading and printing a page.
    #[arg(long = "browser-render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,

    /// Override the network quiet window that marks a page ready to print.
    #[arg(long = "browser-network-idle-millis", value_name = "MILLIS")]
    pub network_idle_millis: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the maximum accepted request body size in bytes.
    #[arg(long = "server-max-body-bytes", value_name = "BYTES")]
    pub server_max_body_bytes: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliInputKind {
    Html,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputFormat {
    Pdf,
    Docx,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Source document.
    #[arg(long, short = 'i', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Input kind; inferred from the file extension when omitted.
    #[arg(long, value_enum)]
    pub kind: Option<CliInputKind>,

    /// Output format.
    #[arg(long, short = 'f', value_enum, default_value_t = CliOutputFormat::Pdf)]
    pub format: CliOutputFormat,

    /// Destination file; defaults to the input path with the format's extension.
    #[arg(long, short = 'o', value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
