//! Process configuration read once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use jobboard_notifications::{RenderDefaults, RetryPolicy};
use jobboard_observability::LogFormat;

/// Which mail transport the workers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailTransportKind {
    /// Log every message (development default)
    #[default]
    Log,
    /// Keep messages in memory; exposed at `GET /admin/outbox`
    Memory,
}

impl FromStr for MailTransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::invalid("MAIL_TRANSPORT", s, "expected log or memory")),
        }
    }
}

/// Top-level configuration for the API process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    /// Alternative policy document; the built-in table is used when unset
    pub policy_path: Option<PathBuf>,
    /// Directory of `<event_type>.txt` template overrides
    pub template_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub send_timeout: Duration,
    /// How long finished deliveries stay queryable; kept forever when unset
    pub retention: Option<Duration>,
    pub workers: usize,
    pub render: RenderDefaults,
    pub mail_transport: MailTransportKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::Json,
            policy_path: None,
            template_dir: None,
            retry: RetryPolicy::default(),
            send_timeout: Duration::from_secs(30),
            retention: None,
            workers: 2,
            render: RenderDefaults::default(),
            mail_transport: MailTransportKind::Log,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}='{value}' is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| defaults.jwt_secret.clone());

        let retry = RetryPolicy::exponential(
            parse(&get, "NOTIFY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            Duration::from_secs(parse(
                &get,
                "NOTIFY_BASE_DELAY_SECS",
                defaults.retry.base_delay.as_secs(),
            )?),
            Duration::from_secs(parse(
                &get,
                "NOTIFY_MAX_DELAY_SECS",
                defaults.retry.max_delay.as_secs(),
            )?),
        );
        if retry.max_attempts == 0 {
            return Err(ConfigError::invalid("NOTIFY_MAX_ATTEMPTS", "0", "at least one attempt is required"));
        }

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v
                .parse()
                .map_err(|reason: String| ConfigError::invalid("LOG_FORMAT", &v, reason))?,
            None => defaults.log_format,
        };

        let mail_transport = match get("MAIL_TRANSPORT") {
            Some(v) => v.parse()?,
            None => defaults.mail_transport,
        };

        Ok(Self {
            jwt_secret,
            bind_addr: parse(&get, "BIND_ADDR", defaults.bind_addr)?,
            log_format,
            policy_path: get("POLICY_PATH").map(PathBuf::from),
            template_dir: get("TEMPLATE_DIR").map(PathBuf::from),
            retry,
            send_timeout: Duration::from_secs(parse(
                &get,
                "NOTIFY_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )?),
            retention: get("NOTIFY_RETENTION_SECS")
                .map(|_| parse(&get, "NOTIFY_RETENTION_SECS", 0).map(Duration::from_secs))
                .transpose()?,
            workers: parse(&get, "NOTIFY_WORKERS", defaults.workers)?.max(1),
            render: RenderDefaults {
                platform_name: get("PLATFORM_NAME").unwrap_or(defaults.render.platform_name),
                support_email: get("SUPPORT_EMAIL").unwrap_or(defaults.render.support_email),
            },
            mail_transport,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, &raw, e.to_string())),
        None => Ok(default),
    }
}
