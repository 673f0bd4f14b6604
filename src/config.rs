// src/config.rs
//! Explicit configuration built once at process start and passed by reference
//! into the pipeline. No ambient global state.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_SOURCES_PATH: &str = "DIGEST_SOURCES_PATH";
const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("no valid recipients configured (set NOTIFY_EMAIL_TO)")]
    NoRecipients,

    #[error("reading sources file {path}: {source}")]
    ReadSources {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing sources file: {0}")]
    ParseSources(#[from] toml::de::Error),

    #[error("invalid mailbox address {addr}: {reason}")]
    InvalidMailbox { addr: String, reason: String },

    #[error("invalid SMTP relay {host}: {reason}")]
    InvalidRelay { host: String, reason: String },
}

/// One RSS article feed to aggregate.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

/// Static description of the digest consumer's interests. Read-only input to
/// ranking; the pipeline never mutates it.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
    pub background: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    feeds: Vec<FeedSpec>,
    #[serde(default)]
    video_channels: Vec<String>,
    profile: Profile,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub feeds: Vec<FeedSpec>,
    pub video_channels: Vec<String>,
    pub profile: Profile,
    pub openai_api_key: String,
    pub model: String,
    pub smtp: SmtpSettings,
    pub http_timeout_secs: u64,
    pub transcript_concurrency: usize,
}

impl Settings {
    /// Load settings from the environment plus the sources TOML file.
    /// Path resolution: explicit argument, then $DIGEST_SOURCES_PATH, then
    /// `config/sources.toml`.
    pub fn load(sources_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match sources_path {
            Some(p) => p.to_path_buf(),
            None => std::env::var(ENV_SOURCES_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOURCES_PATH)),
        };
        let sources = load_sources(&path)?;

        let recipients = parse_recipients(&require_env("NOTIFY_EMAIL_TO")?);
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }

        Ok(Self {
            database_url: std::env::var("DIGEST_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:digest.db?mode=rwc".to_string()),
            feeds: sources.feeds,
            video_channels: sources.video_channels,
            profile: sources.profile,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            model: std::env::var("DIGEST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            smtp: SmtpSettings {
                host: require_env("SMTP_HOST")?,
                username: require_env("SMTP_USER")?,
                password: require_env("SMTP_PASS")?,
                from: require_env("NOTIFY_EMAIL_FROM")?,
                recipients,
            },
            http_timeout_secs: env_u64("DIGEST_HTTP_TIMEOUT_SECS", 30),
            transcript_concurrency: env_u64("DIGEST_TRANSCRIPT_CONCURRENCY", 4) as usize,
        })
    }
}

fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadSources {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated recipient list; blanks are dropped. An empty result is a
/// configuration error at the caller, never a silent no-op.
fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
