//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FOLIO_*)
//! 2. TOML config file (if FOLIO_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FOLIO_*)
/// 2. TOML config file (if FOLIO_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of bundled assets served by `file` routes.
    ///
    /// Set via FOLIO_ASSET_ROOT environment variable.
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Path to the SQLite database backing the shared response cache
    /// and the persisted-object store.
    ///
    /// Set via FOLIO_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for outbound requests.
    ///
    /// Set via FOLIO_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Value of the versioned client identifier header attached to API
    /// proxy requests.
    ///
    /// Set via FOLIO_CLIENT_VERSION_HEADER environment variable.
    #[serde(default = "default_client_version_header")]
    pub client_version_header: String,

    /// Outbound request timeout in milliseconds.
    ///
    /// Set via FOLIO_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest body the transport will copy into the shared response cache.
    ///
    /// Set via FOLIO_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Capacity of the path-keyed response cache.
    #[serde(default = "default_cache_capacity")]
    pub response_cache_capacity: usize,

    /// Capacity of the article cache.
    #[serde(default = "default_cache_capacity")]
    pub article_cache_capacity: usize,

    /// Scheme of synthetic URLs (default: `app`).
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host of synthetic URLs (default: `host`).
    #[serde(default = "default_scheme_host")]
    pub scheme_host: String,

    /// Address the loopback host binds to.
    ///
    /// Set via FOLIO_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Minimum declared width for an image to join the gallery.
    #[serde(default = "default_min_gallery_size")]
    pub min_gallery_width: u32,

    /// Minimum declared height for an image to join the gallery.
    #[serde(default = "default_min_gallery_size")]
    pub min_gallery_height: u32,
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./folio-cache.sqlite")
}

fn default_user_agent() -> String {
    "folio/0.1".into()
}

fn default_client_version_header() -> String {
    format!("folio/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_cache_capacity() -> usize {
    6
}

fn default_scheme() -> String {
    "app".into()
}

fn default_scheme_host() -> String {
    "host".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:48780".into()
}

fn default_min_gallery_size() -> u32 {
    64
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            client_version_header: default_client_version_header(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            response_cache_capacity: default_cache_capacity(),
            article_cache_capacity: default_cache_capacity(),
            scheme: default_scheme(),
            scheme_host: default_scheme_host(),
            listen_addr: default_listen_addr(),
            min_gallery_width: default_min_gallery_size(),
            min_gallery_height: default_min_gallery_size(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FOLIO_`
    /// 2. TOML file from `FOLIO_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("FOLIO_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FOLIO_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
