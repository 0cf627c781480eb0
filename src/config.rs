use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_SETTLE_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SETTLE_BACKOFF_FACTOR: u32 = 2;

pub const ENV_API_URL: &str = "CAMPAIGN_API_URL";
pub const ENV_API_TOKEN: &str = "CAMPAIGN_API_TOKEN";
pub const ENV_POLL_INTERVAL_SECS: &str = "CAMPAIGN_POLL_INTERVAL_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CAMPAIGN_REQUEST_TIMEOUT_SECS";
pub const ENV_SETTLE_DELAY_MS: &str = "CAMPAIGN_SETTLE_DELAY_MS";
pub const ENV_SETTLE_MAX_ATTEMPTS: &str = "CAMPAIGN_SETTLE_MAX_ATTEMPTS";
pub const ENV_CACHE_DIR: &str = "CAMPAIGN_CACHE_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub poll_interval_secs: u64,
    /// `None` leaves the HTTP client's own default in place.
    pub request_timeout_secs: Option<u64>,
    pub settle: SettleConfig,
    /// Snapshot cache directory; in-memory cache when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: None,
            settle: SettleConfig::default(),
            cache_dir: None,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Bounds for the re-read loop that runs after a caller phone assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub initial_delay_ms: u64,
    pub max_attempts: u32,
    pub backoff_factor: u32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_attempts: DEFAULT_SETTLE_MAX_ATTEMPTS,
            backoff_factor: DEFAULT_SETTLE_BACKOFF_FACTOR,
        }
    }
}

impl SettleConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// File (if any), then `.env` and process environment, then normalization.
pub fn load(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }

    let mut config = match path {
        Some(path) => load_or_create(path)?,
        None => SyncConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    normalize_config(&mut config);
    Ok(config)
}

pub fn load_or_create(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        let config = SyncConfig::default();
        save(path, &config)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_str::<SyncConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            Ok(config)
        }
        Err(e) => {
            let backup = path.with_extension("json.bak");
            tracing::warn!(
                "Config {} is unreadable ({}), backing up to {} and resetting",
                path.display(),
                e,
                backup.display()
            );
            let _ = fs::copy(path, backup);
            let config = SyncConfig::default();
            save(path, &config)?;
            Ok(config)
        }
    }
}

pub fn save(path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn apply_overrides<F>(config: &mut SyncConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL) {
        config.api_base_url = url;
    }

    if let Some(token) = lookup(ENV_API_TOKEN) {
        config.api_token = Some(token);
    }

    if let Some(raw) = lookup(ENV_POLL_INTERVAL_SECS) {
        config.poll_interval_secs = parse_env(ENV_POLL_INTERVAL_SECS, raw)?;
    }

    if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
        config.request_timeout_secs = Some(parse_env(ENV_REQUEST_TIMEOUT_SECS, raw)?);
    }

    if let Some(raw) = lookup(ENV_SETTLE_DELAY_MS) {
        config.settle.initial_delay_ms = parse_env(ENV_SETTLE_DELAY_MS, raw)?;
    }

    if let Some(raw) = lookup(ENV_SETTLE_MAX_ATTEMPTS) {
        config.settle.max_attempts = parse_env(ENV_SETTLE_MAX_ATTEMPTS, raw)?;
    }

    if let Some(dir) = lookup(ENV_CACHE_DIR) {
        config.cache_dir = Some(PathBuf::from(dir));
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value: raw })
}

pub fn normalize_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_config(config: &mut SyncConfig) {
    config.api_base_url = normalize_base_url(&config.api_base_url);
    config.api_token = config
        .api_token
        .take()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if config.poll_interval_secs == 0 {
        config.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
    }
    if config.settle.max_attempts == 0 {
        config.settle.max_attempts = 1;
    }
    if config.settle.backoff_factor == 0 {
        config.settle.backoff_factor = 1;
    }
}
