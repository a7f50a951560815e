//! Bounds checks applied to a loaded [`AppConfig`].

use std::net::SocketAddr;
use std::ops::RangeInclusive;

use crate::config::AppConfig;
use thiserror::Error;

/// Allowed request timeout, in milliseconds.
const TIMEOUT_MS: RangeInclusive<u64> = 100..=300_000;

/// Allowed size of a body copied into the shared cache.
const MAX_BYTES: RangeInclusive<usize> = 1..=50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.to_string(), reason: reason.into() }
}

impl AppConfig {
    /// Reject values the interceptor cannot run with.
    ///
    /// A missing `asset_root` is only logged: file routes then answer 404.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, capacity) in [
            ("response_cache_capacity", self.response_cache_capacity),
            ("article_cache_capacity", self.article_cache_capacity),
        ] {
            if capacity == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if !TIMEOUT_MS.contains(&self.timeout_ms) {
            return Err(invalid("timeout_ms", format!("must be within {TIMEOUT_MS:?}")));
        }
        if !MAX_BYTES.contains(&self.max_bytes) {
            return Err(invalid("max_bytes", format!("must be within {MAX_BYTES:?}")));
        }

        for (field, value) in [
            ("user_agent", &self.user_agent),
            ("scheme", &self.scheme),
            ("scheme_host", &self.scheme_host),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        if matches!(self.scheme.to_ascii_lowercase().as_str(), "http" | "https") {
            return Err(invalid("scheme", "must not be a network scheme"));
        }

        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(invalid("listen_addr", format!("{} is not a socket address", self.listen_addr)));
        }

        if !self.asset_root.is_dir() {
            tracing::warn!(asset_root = %self.asset_root.display(), "asset_root is not a directory; file routes will 404");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = AppConfig { response_cache_capacity: 0, ..Default::default() };
        assert_eq!(rejected_field(config), "response_cache_capacity");

        let config = AppConfig { article_cache_capacity: 0, ..Default::default() };
        assert_eq!(rejected_field(config), "article_cache_capacity");
    }

    #[test]
    fn test_timeout_bounds() {
        assert_eq!(rejected_field(AppConfig { timeout_ms: 50, ..Default::default() }), "timeout_ms");
        assert_eq!(rejected_field(AppConfig { timeout_ms: 301_000, ..Default::default() }), "timeout_ms");
    }

    #[test]
    fn test_max_bytes_bounds() {
        assert_eq!(rejected_field(AppConfig { max_bytes: 0, ..Default::default() }), "max_bytes");
        assert_eq!(rejected_field(AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() }), "max_bytes");
    }

    #[test]
    fn test_blank_strings_rejected() {
        assert_eq!(rejected_field(AppConfig { user_agent: String::new(), ..Default::default() }), "user_agent");
        assert_eq!(rejected_field(AppConfig { scheme_host: " ".into(), ..Default::default() }), "scheme_host");
    }

    #[test]
    fn test_network_scheme_rejected() {
        assert_eq!(rejected_field(AppConfig { scheme: "HTTPS".into(), ..Default::default() }), "scheme");
    }

    #[test]
    fn test_listen_addr_must_parse() {
        assert_eq!(rejected_field(AppConfig { listen_addr: "localhost".into(), ..Default::default() }), "listen_addr");
    }

    #[test]
    fn test_boundary_values_accepted() {
        let config = AppConfig { response_cache_capacity: 1, timeout_ms: 100, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
