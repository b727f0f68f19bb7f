use crate::clock::SystemClock;
use crate::error::ConfigError;
use crate::validation::ValidatorConfig;
use crate::validation::rules::normalize_mailbox;
use crate::zone::constants::{DEFAULT_HOSTMASTER, DEFAULT_TTL, MAX_TTL};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest accepted UTC offset in minutes (exclusive)
const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// TTL given to records submitted without one
    pub default_ttl: u32,

    /// Responsible mailbox inserted into SOA content that leaves it out
    pub hostmaster: String,

    /// Commit attempts after the first one that hit a concurrent write
    pub max_commit_retries: u32,

    /// Split unquoted TXT content into character strings instead of rejecting it
    pub txt_auto_quote: bool,

    /// Offset from UTC used to decide the date of a date-encoded serial
    pub utc_offset_minutes: i32,

    /// JSON snapshot of the zone store (None = in memory only)
    pub store_path: Option<PathBuf>,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            hostmaster: DEFAULT_HOSTMASTER.to_string(),
            max_commit_retries: 3,
            txt_auto_quote: true,
            utc_offset_minutes: 0,
            store_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// On-disk layout; every key is optional and falls back to the default
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    default_ttl: Option<u32>,
    hostmaster: Option<String>,
    max_commit_retries: Option<u32>,
    txt_auto_quote: Option<bool>,
    utc_offset_minutes: Option<i32>,
    store_path: Option<PathBuf>,
    log_level: Option<String>,
}

impl EngineConfig {
    /// Create an EngineConfig from environment variables
    /// Returns Err if any variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Override this configuration with `ZONEWARDEN_*` environment variables
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(ttl) = var("ZONEWARDEN_DEFAULT_TTL") {
            self.default_ttl = ttl
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidDefaultTtl(ttl.clone()))?;
        }

        if let Some(hostmaster) = var("ZONEWARDEN_HOSTMASTER") {
            self.hostmaster = hostmaster;
        }

        if let Some(retries) = var("ZONEWARDEN_MAX_COMMIT_RETRIES") {
            self.max_commit_retries = retries
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidRetryLimit(retries.clone()))?;
        }

        if let Some(auto_quote) = var("ZONEWARDEN_TXT_AUTO_QUOTE") {
            self.txt_auto_quote = parse_bool(&auto_quote, self.txt_auto_quote);
        }

        if let Some(offset) = var("ZONEWARDEN_UTC_OFFSET_MINUTES") {
            self.utc_offset_minutes = offset
                .trim()
                .parse::<i32>()
                .map_err(|_| ConfigError::InvalidUtcOffset(offset.clone()))?;
        }

        if let Some(path) = var("ZONEWARDEN_STORE_PATH") {
            self.store_path = (!path.trim().is_empty()).then(|| PathBuf::from(path.trim()));
        }

        if let Some(level) = var("ZONEWARDEN_LOG_LEVEL") {
            self.log_level = level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(input)?;
        let defaults = Self::default();
        let config = Self {
            default_ttl: file.default_ttl.unwrap_or(defaults.default_ttl),
            hostmaster: file.hostmaster.unwrap_or(defaults.hostmaster),
            max_commit_retries: file.max_commit_retries.unwrap_or(defaults.max_commit_retries),
            txt_auto_quote: file.txt_auto_quote.unwrap_or(defaults.txt_auto_quote),
            utc_offset_minutes: file.utc_offset_minutes.unwrap_or(defaults.utc_offset_minutes),
            store_path: file.store_path.or(defaults.store_path),
            log_level: file.log_level.unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if i64::from(self.default_ttl) > MAX_TTL {
            return Err(ConfigError::InvalidDefaultTtl(format!(
                "{} exceeds {}",
                self.default_ttl, MAX_TTL
            )));
        }

        normalize_mailbox(&self.hostmaster)
            .map_err(|e| ConfigError::InvalidHostmaster(e.reason))?;

        // Each retry re-reads the zone; more than this points at a stuck writer
        if self.max_commit_retries > 100 {
            return Err(ConfigError::InvalidRetryLimit(format!(
                "{} retries is too many (max 100)",
                self.max_commit_retries
            )));
        }

        if self.utc_offset_minutes.abs() >= MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::InvalidUtcOffset(format!(
                "{} minutes must be less than a day",
                self.utc_offset_minutes
            )));
        }

        Ok(())
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            default_ttl: self.default_ttl,
            hostmaster: self.hostmaster.clone(),
            txt_auto_quote: self.txt_auto_quote,
        }
    }

    /// The wall clock in the configured offset
    pub fn clock(&self) -> Result<SystemClock, ConfigError> {
        SystemClock::with_offset_minutes(self.utc_offset_minutes)
            .ok_or_else(|| ConfigError::InvalidUtcOffset(self.utc_offset_minutes.to_string()))
    }
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
