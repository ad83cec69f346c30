//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::encode::PayloadDelivery;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pergamena";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_LAYOUT: &str = "diploma";
const DEFAULT_DELIMITER_OPEN: &str = "<%";
const DEFAULT_DELIMITER_CLOSE: &str = "%>";
const DEFAULT_ENCODER_SCALE: u32 = 2;
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_SOURCE_LIMIT: usize = 100;
const DEFAULT_CACHE_COMPILED_LIMIT: usize = 100;

/// Command-line arguments for the Pergamena binary.
#[derive(Debug, Parser)]
#[command(name = "pergamena", version, about = "Pergamena certificate rendering server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PERGAMENA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Pergamena HTTP service.
    Serve(Box<ServeArgs>),
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

    /// Override the log level directive.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force JSON log output.
    #[arg(long = "log-json", value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the layout templates directory.
    #[arg(long = "templates-directory", value_name = "PATH")]
    pub templates_directory: Option<PathBuf>,

    /// Override the default layout name.
    #[arg(long = "templates-default-layout", value_name = "NAME")]
    pub templates_default_layout: Option<String>,

    /// Override the rendering engine executable path.
    #[arg(long = "engine-executable", value_name = "PATH")]
    pub engine_executable: Option<PathBuf>,

    /// Start the rendering engine eagerly instead of on first use.
    #[arg(long = "engine-warm-on-startup", value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub engine_warm_on_startup: Option<bool>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub templates: TemplateSettings,
    pub encoder: EncoderSettings,
    pub engine: EngineSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
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

/// Placeholder marker pair used by the display layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub directory: PathBuf,
    pub default_layout: String,
    pub delimiters: Delimiters,
}

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub scale: u32,
    pub delivery: PayloadDelivery,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Browser executable; `None` lets the engine pick the system default.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub extra_args: Vec<String>,
    pub warm_on_startup: bool,
    pub startup_timeout: Duration,
    pub convert_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub source_limit: usize,
    pub compiled_limit: usize,
    pub source_ttl_seconds: u64,
    pub compiled_ttl_seconds: u64,
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

    builder = builder.add_source(Environment::with_prefix("PERGAMENA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
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
    templates: RawTemplateSettings,
    encoder: RawEncoderSettings,
    engine: RawEngineSettings,
    cache: RawCacheSettings,
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
        if let Some(directory) = overrides.templates_directory.as_ref() {
            self.templates.directory = Some(directory.clone());
        }
        if let Some(layout) = overrides.templates_default_layout.as_ref() {
            self.templates.default_layout = Some(layout.clone());
        }
        if let Some(executable) = overrides.engine_executable.as_ref() {
            self.engine.executable = Some(executable.clone());
        }
        if let Some(warm) = overrides.engine_warm_on_startup {
            self.engine.warm_on_startup = Some(warm);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            templates,
            encoder,
            engine,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            templates: build_template_settings(templates)?,
            encoder: build_encoder_settings(encoder)?,
            engine: build_engine_settings(engine)?,
            cache: build_cache_settings(cache),
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

    let candidate = format!("{host}:{port}");
    let public_addr = candidate
        .parse()
        .map_err(|err| LoadError::invalid("server.public_addr", format!("invalid address `{candidate}`: {err}")))?;

    Ok(ServerSettings { public_addr })
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

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    let directory = templates
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "templates.directory",
            "path must not be empty",
        ));
    }

    let default_layout = templates
        .default_layout
        .unwrap_or_else(|| DEFAULT_LAYOUT.to_string());
    if default_layout.trim().is_empty() {
        return Err(LoadError::invalid(
            "templates.default_layout",
            "layout name must not be empty",
        ));
    }

    let delimiters = match templates.delimiters {
        Some(pair) => {
            let [open, close]: [String; 2] = pair.try_into().map_err(|_| {
                LoadError::invalid(
                    "templates.delimiters",
                    "expected exactly two marker strings",
                )
            })?;
            if open.is_empty() || close.is_empty() {
                return Err(LoadError::invalid(
                    "templates.delimiters",
                    "markers must not be empty",
                ));
            }
            if open == close {
                return Err(LoadError::invalid(
                    "templates.delimiters",
                    "open and close markers must differ",
                ));
            }
            Delimiters { open, close }
        }
        None => Delimiters {
            open: DEFAULT_DELIMITER_OPEN.to_string(),
            close: DEFAULT_DELIMITER_CLOSE.to_string(),
        },
    };

    Ok(TemplateSettings {
        directory,
        default_layout,
        delimiters,
    })
}

fn build_encoder_settings(encoder: RawEncoderSettings) -> Result<EncoderSettings, LoadError> {
    let scale = encoder.scale.unwrap_or(DEFAULT_ENCODER_SCALE);
    if scale == 0 {
        return Err(LoadError::invalid(
            "encoder.scale",
            "scale must be greater than zero",
        ));
    }

    let delivery = match encoder.delivery {
        Some(mode) => mode
            .parse::<PayloadDelivery>()
            .map_err(|reason| LoadError::invalid("encoder.delivery", reason))?,
        None => PayloadDelivery::Inline,
    };

    Ok(EncoderSettings { scale, delivery })
}

fn build_engine_settings(engine: RawEngineSettings) -> Result<EngineSettings, LoadError> {
    let startup_secs = engine
        .startup_timeout_seconds
        .unwrap_or(DEFAULT_STARTUP_TIMEOUT_SECS);
    if startup_secs == 0 {
        return Err(LoadError::invalid(
            "engine.startup_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let convert_secs = engine
        .convert_timeout_seconds
        .unwrap_or(DEFAULT_CONVERT_TIMEOUT_SECS);
    if convert_secs == 0 {
        return Err(LoadError::invalid(
            "engine.convert_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(EngineSettings {
        executable: engine.executable,
        headless: engine.headless.unwrap_or(true),
        no_sandbox: engine.no_sandbox.unwrap_or(true),
        extra_args: engine
            .extra_args
            .unwrap_or_else(|| vec!["--disable-gpu".to_string()]),
        warm_on_startup: engine.warm_on_startup.unwrap_or(false),
        startup_timeout: Duration::from_secs(startup_secs),
        convert_timeout: Duration::from_secs(convert_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        source_limit: cache.source_limit.unwrap_or(DEFAULT_CACHE_SOURCE_LIMIT),
        compiled_limit: cache.compiled_limit.unwrap_or(DEFAULT_CACHE_COMPILED_LIMIT),
        source_ttl_seconds: cache.source_ttl_seconds.unwrap_or(0),
        compiled_ttl_seconds: cache.compiled_ttl_seconds.unwrap_or(0),
    }
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
struct RawTemplateSettings {
    directory: Option<PathBuf>,
    default_layout: Option<String>,
    delimiters: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEncoderSettings {
    scale: Option<u32>,
    delivery: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEngineSettings {
    executable: Option<PathBuf>,
    headless: Option<bool>,
    no_sandbox: Option<bool>,
    extra_args: Option<Vec<String>>,
    warm_on_startup: Option<bool>,
    startup_timeout_seconds: Option<u64>,
    convert_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    source_limit: Option<usize>,
    compiled_limit: Option<usize>,
    source_ttl_seconds: Option<u64>,
    compiled_ttl_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.server.public_addr.port(), DEFAULT_PORT);
        assert_eq!(settings.templates.default_layout, "diploma");
        assert_eq!(settings.templates.delimiters.open, "<%");
        assert_eq!(settings.encoder.scale, 2);
        assert!(settings.engine.headless);
        assert!(!settings.engine.warm_on_startup);
        assert_eq!(settings.engine.convert_timeout, Duration::from_secs(30));
        assert_eq!(settings.cache.source_limit, 100);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            templates_default_layout: Some("transcript".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.public_addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.templates.default_layout, "transcript");
    }

    #[test]
    fn delimiters_must_be_a_pair() {
        let mut raw = RawSettings::default();
        raw.templates.delimiters = Some(vec!["<%".to_string()]);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn delimiters_must_differ() {
        let mut raw = RawSettings::default();
        raw.templates.delimiters = Some(vec!["@@".to_string(), "@@".to_string()]);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn unknown_delivery_mode_is_rejected() {
        let mut raw = RawSettings::default();
        raw.encoder.delivery = Some("zip".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn zero_convert_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.engine.convert_timeout_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }
}
