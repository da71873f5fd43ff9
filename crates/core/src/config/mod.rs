//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FAIRWEATHER_*)
//! 2. TOML config file (if FAIRWEATHER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::tiers::TierNames;

mod validation;

pub use validation::ConfigError;

/// Build manifest: assets that must be in the static tier after install.
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/",
    "/src/main.js",
    "/src/weather3d.js",
    "/src/weatherApi.js",
    "/src/storage.js",
    "/src/ui.js",
    "/src/particleSystem.js",
    "/src/lottieManager.js",
    "/src/index.css",
    "/animations/sun.json",
    "/animations/moon.json",
    "/animations/clouds.json",
    "/animations/rain.json",
    "/animations/snow.json",
    "/manifest.json",
];

/// Hosts whose requests are classified as remote API calls.
pub const DEFAULT_API_HOSTS: &[&str] = &["api.openweathermap.org", "api.unsplash.com"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FAIRWEATHER_*)
/// 2. TOML config file (if FAIRWEATHER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database used by the durable store and the tiers.
    ///
    /// Set via FAIRWEATHER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Whether the store may use the durable backend at all.
    ///
    /// Set via FAIRWEATHER_DURABLE_STORE environment variable.
    #[serde(default = "default_true")]
    pub durable_store: bool,

    /// TTL for store entries written without one, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Interval between expired-entry sweeps, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Upper bound on a single network fetch before falling back, in milliseconds.
    ///
    /// Set via FAIRWEATHER_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Largest response body accepted from the network, in bytes.
    ///
    /// Set via FAIRWEATHER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// User-Agent string for network fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Cache version baked into the tier names.
    ///
    /// Set via FAIRWEATHER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths served cache-first from the static tier.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Hosts whose responses are served network-first.
    #[serde(default = "default_api_hosts")]
    pub api_hosts: Vec<String>,

    /// Path prefix of animation assets (served cache-first).
    #[serde(default = "default_animation_prefix")]
    pub animation_prefix: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./fairweather-cache.sqlite")
}

fn default_true() -> bool {
    true
}

fn default_ttl_ms() -> u64 {
    3_600_000
}

fn default_sweep_interval_ms() -> u64 {
    1_800_000
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_user_agent() -> String {
    "fairweather/0.1".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_static_assets() -> Vec<String> {
    DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_api_hosts() -> Vec<String> {
    DEFAULT_API_HOSTS.iter().map(|s| s.to_string()).collect()
}

fn default_animation_prefix() -> String {
    "/animations/".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            durable_store: true,
            default_ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_bytes: default_max_bytes(),
            user_agent: default_user_agent(),
            cache_version: default_cache_version(),
            static_assets: default_static_assets(),
            api_hosts: default_api_hosts(),
            animation_prefix: default_animation_prefix(),
        }
    }
}

impl AppConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Names of the current build's tiers.
    pub fn tier_names(&self) -> TierNames {
        TierNames::for_version(&self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FAIRWEATHER_`
    /// 2. TOML file from `FAIRWEATHER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FAIRWEATHER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("FAIRWEATHER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    /// Load configuration from a TOML string layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the TOML does not parse or validation fails.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
