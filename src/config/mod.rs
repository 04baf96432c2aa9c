//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::{Host, Url};

mod cli;

pub use cli::{CliArgs, Command, Overrides, TargetArgs};

const LOCAL_CONFIG_BASENAME: &str = "entries";
const ENV_PREFIX: &str = "ENTRIES";
pub const DEFAULT_CLIENT_ID: &str = "https://github.com/tsileo/entries";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:7881/";
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub auth: AuthSettings,
    pub browser: BrowserSettings,
    pub editor: EditorSettings,
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
pub struct AuthSettings {
    pub client_id: Url,
    pub redirect_uri: Url,
    /// Loopback address the callback listener binds, derived from `redirect_uri`.
    pub callback_addr: SocketAddr,
    /// `None` waits for the callback indefinitely.
    pub callback_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub enabled: bool,
    pub command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub command: Option<String>,
    pub recovery_dir: PathBuf,
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
    let mut builder =
        Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    auth: RawAuthSettings,
    browser: RawBrowserSettings,
    editor: RawEditorSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if overrides.no_browser {
            self.browser.enabled = Some(false);
        }
        if let Some(command) = overrides.browser_command.as_ref() {
            self.browser.command = Some(command.clone());
        }
        if let Some(command) = overrides.editor.as_ref() {
            self.editor.command = Some(command.clone());
        }
        if let Some(seconds) = overrides.callback_timeout_seconds {
            self.auth.callback_timeout_seconds = Some(seconds);
        }
        if let Some(client_id) = overrides.client_id.as_ref() {
            self.auth.client_id = Some(client_id.clone());
        }
        if let Some(redirect_uri) = overrides.redirect_uri.as_ref() {
            self.auth.redirect_uri = Some(redirect_uri.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            auth,
            browser,
            editor,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            auth: build_auth_settings(auth)?,
            browser: build_browser_settings(browser),
            editor: build_editor_settings(editor),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let client_id = non_blank(auth.client_id).unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
    let client_id = Url::parse(&client_id)
        .map_err(|err| LoadError::invalid("auth.client_id", format!("invalid URL: {err}")))?;

    let redirect_uri =
        non_blank(auth.redirect_uri).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
    let redirect_uri = Url::parse(&redirect_uri)
        .map_err(|err| LoadError::invalid("auth.redirect_uri", format!("invalid URL: {err}")))?;
    let callback_addr = loopback_addr(&redirect_uri)
        .map_err(|reason| LoadError::invalid("auth.redirect_uri", reason))?;

    let timeout_secs = auth
        .callback_timeout_seconds
        .unwrap_or(DEFAULT_CALLBACK_TIMEOUT_SECS);
    let callback_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    Ok(AuthSettings {
        client_id,
        redirect_uri,
        callback_addr,
        callback_timeout,
    })
}

fn build_browser_settings(browser: RawBrowserSettings) -> BrowserSettings {
    BrowserSettings {
        enabled: browser.enabled.unwrap_or(true),
        command: non_blank(browser.command),
    }
}

fn build_editor_settings(editor: RawEditorSettings) -> EditorSettings {
    EditorSettings {
        command: non_blank(editor.command),
        recovery_dir: editor
            .recovery_dir
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(std::env::temp_dir),
    }
}

/// The callback listener must live on this machine, so only loopback redirect URIs are accepted.
fn loopback_addr(redirect_uri: &Url) -> Result<SocketAddr, String> {
    if redirect_uri.scheme() != "http" {
        return Err(format!(
            "scheme must be `http`, found `{}`",
            redirect_uri.scheme()
        ));
    }

    let ip = match redirect_uri.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        Some(other) => return Err(format!("host `{other}` is not a loopback address")),
        None => return Err("missing host".to_string()),
    };

    let port = redirect_uri
        .port()
        .ok_or_else(|| "an explicit port is required".to_string())?;
    if port == 0 {
        return Err("port must be greater than zero".to_string());
    }

    Ok(SocketAddr::new(ip, port))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    callback_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    enabled: Option<bool>,
    command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEditorSettings {
    command: Option<String>,
    recovery_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests;
