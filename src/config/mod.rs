//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::failure::RuntimeMode;
use crate::application::render::DEFAULT_MAX_PASSES;
use crate::application::response::DEFAULT_PUBLIC_PATH;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "trellis";
const ENV_PREFIX: &str = "TRELLIS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_TRACKER_TIMEOUT_SECS: u64 = 5;

/// Command-line arguments for the trellis binary.
#[derive(Debug, Parser)]
#[command(name = "trellis", version, about = "Streaming server-side renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TRELLIS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve every GET path through the renderer.
    Serve(Box<ServeArgs>),
    /// Render a single path in-process and print the response.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: PipelineOverrides,

    /// Path and query to render, for example `/thread/1?t=1`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Render as this signed-in viewer.
    #[arg(long = "user", value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PipelineOverrides {
    /// Override the execution mode (development|production).
    #[arg(long = "runtime-mode", value_name = "MODE")]
    pub runtime_mode: Option<String>,

    /// Override the cap on data-resolution passes per render.
    #[arg(long = "render-max-resolution-passes", value_name = "COUNT")]
    pub render_max_resolution_passes: Option<u32>,

    /// Override the asset manifest location.
    #[arg(long = "assets-manifest-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub assets_manifest_path: Option<PathBuf>,

    /// Override the public prefix for manifest files.
    #[arg(long = "assets-public-path", value_name = "PREFIX")]
    pub assets_public_path: Option<String>,

    /// Override the error tracker endpoint.
    #[arg(long = "error-tracking-endpoint", value_name = "URL")]
    pub error_tracking_endpoint: Option<String>,

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

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub pipeline: PipelineOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub runtime: RuntimeSettings,
    pub render: RenderSettings,
    pub assets: AssetSettings,
    pub error_tracking: ErrorTrackingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub mode: RuntimeMode,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub max_resolution_passes: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    /// No manifest means no lazy-module scripts are emitted.
    pub manifest_path: Option<PathBuf>,
    pub public_path: String,
}

#[derive(Debug, Clone)]
pub struct ErrorTrackingSettings {
    pub endpoint: Option<Url>,
    pub timeout: Duration,
    pub environment: String,
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
        Some(Command::Render(args)) => raw.apply_pipeline_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    runtime: RawRuntimeSettings,
    render: RawRenderSettings,
    assets: RawAssetSettings,
    error_tracking: RawErrorTrackingSettings,
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

        self.apply_pipeline_overrides(&overrides.pipeline);
    }

    fn apply_pipeline_overrides(&mut self, overrides: &PipelineOverrides) {
        if let Some(mode) = overrides.runtime_mode.as_ref() {
            self.runtime.mode = Some(mode.clone());
        }
        if let Some(passes) = overrides.render_max_resolution_passes {
            self.render.max_resolution_passes = Some(passes.into());
        }
        if let Some(path) = overrides.assets_manifest_path.as_ref() {
            self.assets.manifest_path = Some(path.clone());
        }
        if let Some(prefix) = overrides.assets_public_path.as_ref() {
            self.assets.public_path = Some(prefix.clone());
        }
        if let Some(endpoint) = overrides.error_tracking_endpoint.as_ref() {
            self.error_tracking.endpoint = Some(endpoint.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            runtime,
            render,
            assets,
            error_tracking,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let runtime = build_runtime_settings(runtime)?;
        let render = build_render_settings(render)?;
        let assets = build_asset_settings(assets)?;
        let error_tracking = build_error_tracking_settings(error_tracking, runtime.mode)?;

        Ok(Self {
            server,
            logging,
            runtime,
            render,
            assets,
            error_tracking,
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

    let public_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
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

fn build_runtime_settings(runtime: RawRuntimeSettings) -> Result<RuntimeSettings, LoadError> {
    let mode = match runtime.mode.as_deref().map(str::trim) {
        None | Some("") => RuntimeMode::default(),
        Some(value) if value.eq_ignore_ascii_case("development") => RuntimeMode::Development,
        Some(value) if value.eq_ignore_ascii_case("production") => RuntimeMode::Production,
        Some(other) => {
            return Err(LoadError::invalid(
                "runtime.mode",
                format!("expected `development` or `production`, got `{other}`"),
            ));
        }
    };
    Ok(RuntimeSettings { mode })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let passes = render
        .max_resolution_passes
        .unwrap_or(DEFAULT_MAX_PASSES.into());
    let max_resolution_passes = non_zero_u32(passes, "render.max_resolution_passes")?;
    Ok(RenderSettings {
        max_resolution_passes,
    })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let manifest_path = assets
        .manifest_path
        .filter(|path| !path.as_os_str().is_empty());

    let public_path = assets
        .public_path
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_PUBLIC_PATH.to_string());
    if public_path.is_empty() {
        return Err(LoadError::invalid(
            "assets.public_path",
            "must not be empty",
        ));
    }

    Ok(AssetSettings {
        manifest_path,
        public_path,
    })
}

fn build_error_tracking_settings(
    tracking: RawErrorTrackingSettings,
    mode: RuntimeMode,
) -> Result<ErrorTrackingSettings, LoadError> {
    let endpoint = match tracking.endpoint.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(Url::parse(value).map_err(|err| {
            LoadError::invalid("error_tracking.endpoint", format!("invalid url: {err}"))
        })?),
    };

    let timeout_secs = tracking
        .timeout_seconds
        .unwrap_or(DEFAULT_TRACKER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "error_tracking.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let environment = tracking
        .environment
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| mode.as_str().to_string());

    Ok(ErrorTrackingSettings {
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
        environment,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRuntimeSettings {
    mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    max_resolution_passes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    manifest_path: Option<PathBuf>,
    public_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawErrorTrackingSettings {
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
    environment: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
