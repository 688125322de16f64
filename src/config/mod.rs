//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheBackendKind;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "gazzetta";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_PUBLIC_BASE_URL: &str = "/storage";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_IMAGE_LIMIT_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Command-line arguments for the gazzetta binary.
#[derive(Debug, Parser)]
#[command(name = "gazzetta", version, about = "gazzetta content backend")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "GAZZETTA_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the gazzetta HTTP service.
    Serve(ServeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

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

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the public base URL stored assets are served under.
    #[arg(long = "uploads-public-base-url", value_name = "URL")]
    pub uploads_public_base_url: Option<String>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the maximum accepted image size in bytes.
    #[arg(long = "uploads-max-image-bytes", value_name = "BYTES")]
    pub uploads_max_image_bytes: Option<u64>,

    /// Override the cache backend (tagged|plain).
    #[arg(long = "cache-backend", value_name = "KIND")]
    pub cache_backend: Option<String>,

    /// Override the listing cache TTL in seconds.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the listing cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,
}

/// Fully-resolved deployment settings after precedence resolution and
/// validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub public_base_url: String,
    pub max_request_bytes: NonZeroU64,
    pub max_image_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub ttl_seconds: u64,
    pub capacity: usize,
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

/// Parse the command line, then load settings with the configured
/// precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("GAZZETTA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    uploads: RawUploadSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    public_base_url: Option<String>,
    max_request_bytes: Option<u64>,
    max_image_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    ttl_seconds: Option<u64>,
    capacity: Option<usize>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(base) = overrides.uploads_public_base_url.as_ref() {
            self.uploads.public_base_url = Some(base.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(limit) = overrides.uploads_max_image_bytes {
            self.uploads.max_image_bytes = Some(limit);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            uploads,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            uploads: build_upload_settings(uploads)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(raw: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = raw.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = raw.port.unwrap_or(DEFAULT_PORT);
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;
    Ok(ServerSettings { addr })
}

fn build_logging_settings(raw: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match raw.level.as_deref() {
        Some(level) => LevelFilter::from_str(level)
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
        None => LevelFilter::INFO,
    };
    let format = if raw.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    Ok(LoggingSettings { level, format })
}

fn build_database_settings(raw: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = raw.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_connections).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;
    Ok(DatabaseSettings {
        url: raw.url,
        max_connections,
    })
}

fn build_upload_settings(raw: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = raw
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    let public_base_url = raw
        .public_base_url
        .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());

    let max_request_bytes = raw
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;

    let max_image_bytes = raw.max_image_bytes.unwrap_or(DEFAULT_IMAGE_LIMIT_BYTES);
    let max_image_bytes = NonZeroU64::new(max_image_bytes).ok_or_else(|| {
        LoadError::invalid("uploads.max_image_bytes", "must be greater than zero")
    })?;

    if max_image_bytes > max_request_bytes {
        return Err(LoadError::invalid(
            "uploads.max_image_bytes",
            "must not exceed uploads.max_request_bytes",
        ));
    }

    Ok(UploadSettings {
        directory,
        public_base_url,
        max_request_bytes,
        max_image_bytes,
    })
}

fn build_cache_settings(raw: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match raw.backend.as_deref() {
        None => CacheBackendKind::Tagged,
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "tagged" => CacheBackendKind::Tagged,
            "plain" => CacheBackendKind::Plain,
            other => {
                return Err(LoadError::invalid(
                    "cache.backend",
                    format!("unknown backend `{other}`, expected `tagged` or `plain`"),
                ));
            }
        },
    };

    Ok(CacheSettings {
        backend,
        ttl_seconds: raw.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
        capacity: raw.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
    })
}
