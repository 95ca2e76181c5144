use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid digest time '{0}', expected HH:MM")]
    DigestTime(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Cache time-to-live in minutes
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: i64,
    /// Maximum item age eligible for the digest, in hours
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Local time of day the daily digest fires, "HH:MM"
    #[serde(default = "default_digest_time")]
    pub digest_time: String,
    #[serde(default = "default_subscribers_file")]
    pub subscribers_file: String,
    pub feeds: Vec<FeedConfig>,
}

fn default_cache_ttl_minutes() -> i64 {
    30
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_digest_time() -> String {
    "09:00".to_string()
}

fn default_subscribers_file() -> String {
    "subscribers.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn digest_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.digest_time, "%H:%M")
            .map_err(|_| ConfigError::DigestTime(self.digest_time.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub address: String,
    pub password: String,
    pub server: String,
    pub port: u16,
}

/// Mail transport configuration, resolved from the environment.
///
/// Missing credentials are not an error: dispatch becomes a logged no-op.
#[derive(Debug, Clone)]
pub enum MailConfig {
    Smtp(SmtpConfig),
    /// Write the rendered digest to a file instead of contacting SMTP.
    Mock { path: PathBuf },
    Unconfigured,
}

impl MailConfig {
    pub fn from_env() -> Self {
        if std::env::var("MOCK_EMAIL_MODE").as_deref() == Ok("true") {
            let path = std::env::var("MOCK_EMAIL_FILE")
                .unwrap_or_else(|_| "last_email.html".to_string());
            return MailConfig::Mock { path: path.into() };
        }

        match (std::env::var("EMAIL_ADDRESS"), std::env::var("EMAIL_PASSWORD")) {
            (Ok(address), Ok(password)) => MailConfig::Smtp(SmtpConfig {
                address,
                password,
                server: std::env::var("SMTP_SERVER")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
            }),
            _ => MailConfig::Unconfigured,
        }
    }
}
