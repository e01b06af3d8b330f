//! Engine configuration.
//!
//! Everything has a sensible default. A TOML file at
//! `<config_dir>/delve/config.toml` may override any subset of fields, and a
//! handful of environment variables override the file. `rules.yaml` and
//! `backends.yaml` in the same directory replace the built-in tables.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-provider timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Pattern confidence below which the model classifier is consulted
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.9;

/// Rule table override looked up next to `config.toml`
pub const RULES_FILE: &str = "rules.yaml";

/// Backend catalog override looked up next to `config.toml`
pub const CATALOG_FILE: &str = "backends.yaml";

/// Upper bound for the cache TTL and stale grace period (one year)
pub const MAX_CACHE_SECS: u64 = 365 * 24 * 60 * 60;

/// Backend used when no rule matches
pub const DEFAULT_BACKEND: &str = "duckduckgo";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub cache: CacheConfig,
    pub circuit: CircuitConfig,
    pub retry: RetryConfig,
    pub default_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Pattern results below this confidence go to the model classifier
    pub confidence_threshold: f32,

    /// Backend for queries no rule matches
    pub default_backend: String,

    /// Model name passed to the language model, if one is configured
    pub model: Option<String>,

    /// Optional replacement rule table (YAML)
    pub rules_path: Option<PathBuf>,

    /// Optional replacement backend catalog (YAML)
    pub catalog_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            default_backend: DEFAULT_BACKEND.to_string(),
            model: None,
            rules_path: None,
            catalog_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub stale_grace_secs: u64,
    pub max_size: usize,
    /// Background refresh workers for stale entries
    pub revalidate_workers: usize,
    /// Pending refreshes beyond this are dropped
    pub revalidate_queue: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 15 * 60,
            stale_grace_secs: 5 * 60,
            max_size: 500,
            revalidate_workers: 2,
            revalidate_queue: 32,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the computed delay added as random jitter (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            jitter: 0.25,
        }
    }
}

impl EngineConfig {
    /// `<config_dir>/delve`, home of `config.toml` and the optional table
    /// overrides.
    pub fn config_dir() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("delve")
    }

    /// Default location: `<config_dir>/delve/config.toml`.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path, pick up table overrides next to it, then
    /// apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&Self::default_path())?;
        config.discover_tables(&Self::config_dir());
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Use `rules.yaml` and `backends.yaml` from `dir` for any table path the
    /// file left unset, when those files exist.
    pub fn discover_tables(&mut self, dir: &Path) {
        if self.classifier.rules_path.is_none() {
            let path = dir.join(RULES_FILE);
            if path.is_file() {
                self.classifier.rules_path = Some(path);
            }
        }
        if self.classifier.catalog_path.is_none() {
            let path = dir.join(CATALOG_FILE);
            if path.is_file() {
                self.classifier.catalog_path = Some(path);
            }
        }
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `DELVE_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DELVE_CONFIDENCE_THRESHOLD") {
            self.classifier.confidence_threshold = parse_env("DELVE_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("DELVE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("DELVE_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("DELVE_CACHE_MAX_SIZE") {
            self.cache.max_size = parse_env("DELVE_CACHE_MAX_SIZE", &v)?;
        }
        if let Some(v) = lookup("DELVE_MAX_RETRIES") {
            self.retry.max_retries = parse_env("DELVE_MAX_RETRIES", &v)?;
        }
        Ok(())
    }

    /// Reject values that parse but cannot be used: out-of-range fractions
    /// and cache durations too long to turn into deadlines.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.classifier.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "classifier.confidence_threshold",
                format!("{threshold} is outside [0, 1]"),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(invalid(
                "retry.jitter",
                format!("{} is outside [0, 1]", self.retry.jitter),
            ));
        }
        if self.cache.ttl_secs > MAX_CACHE_SECS {
            return Err(invalid(
                "cache.ttl_secs",
                format!("{} exceeds {MAX_CACHE_SECS}", self.cache.ttl_secs),
            ));
        }
        if self.cache.stale_grace_secs > MAX_CACHE_SECS {
            return Err(invalid(
                "cache.stale_grace_secs",
                format!("{} exceeds {MAX_CACHE_SECS}", self.cache.stale_grace_secs),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidSetting { key, reason }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
