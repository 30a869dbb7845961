//! Layered configuration for the CLI.
//!
//! Values resolve in order: built-in defaults, then the TOML settings
//! file, then `FORGE_`-prefixed environment variables with `__` separating
//! nested levels:
//!
//! ```bash
//! FORGE_HOST=forge.internal forge api repos/acme/widgets
//! FORGE_CACHE__TTL_SECS=3600 forge api repos/acme/widgets
//! ```
//!
//! `FORGE_TOKEN` is the conventional way to hand the CLI an
//! already-resolved token; storing credentials is out of scope here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Hostname of the Forge deployment to talk to
    #[serde(default = "default_host")]
    pub host: String,

    /// Response cache behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Token injection
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging defaults and per-module overrides
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Serve eligible responses from the disk cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime in seconds, checked at read time
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Cache root; defaults to the platform cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthConfig {
    /// Pre-resolved API token; `FORGE_TOKEN` takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_host() -> String {
    crate::api::DEFAULT_HOST.to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_secs: default_cache_ttl(),
            dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from the default settings file location.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_with_file(None)
    }

    /// Load, optionally from an explicit settings file path.
    pub fn load_with_file(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        let file = path.unwrap_or_else(config_file);
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("FORGE_").split("__"))
            .extract()
    }

    /// Token injection order: environment first, then the settings file.
    pub fn resolved_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("FORGE_TOKEN") {
            if !token.is_empty() {
                return Some(token);
            }
        }
        self.auth.token.clone()
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Resolved cache root.
    pub fn directory(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("forge")
                .join("http")
        })
    }
}

/// Directory holding the settings file, honoring `FORGE_CONFIG_DIR`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FORGE_CONFIG_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("forge")
}

pub fn config_file() -> PathBuf {
    config_dir().join("settings.toml")
}
