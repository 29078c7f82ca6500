//! PLATEAU API client configuration.
//!
//! Defaults point at the public production endpoint. Override via
//! environment variables or explicit construction for staging/testing.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

/// Public production endpoint of the PLATEAU API.
pub const DEFAULT_BASE_URL: &str = "https://api.plateauview.mlit.go.jp";

/// Configuration for connecting to the PLATEAU API.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct PlateauApiConfig {
    /// Base URL of the API. Default: <https://api.plateauview.mlit.go.jp>
    pub base_url: Url,
    /// Optional bearer token. The public API needs none; gateways in front
    /// of a private mirror may.
    pub api_token: Option<Zeroizing<String>>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Delay between status polls while waiting for a packaging job.
    pub poll_interval_secs: u64,
    /// Overall deadline for a packaging job to reach a terminal state.
    pub pack_timeout_secs: u64,
    /// Consecutive transient poll failures tolerated before giving up.
    pub max_transient_poll_failures: u32,
}

impl std::fmt::Debug for PlateauApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlateauApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("pack_timeout_secs", &self.pack_timeout_secs)
            .field(
                "max_transient_poll_failures",
                &self.max_transient_poll_failures,
            )
            .finish()
    }
}

impl PlateauApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PLATEAU_API_URL` (default: `https://api.plateauview.mlit.go.jp`)
    /// - `PLATEAU_API_TOKEN` (optional)
    /// - `PLATEAU_TIMEOUT_SECS` (default: 30)
    /// - `PLATEAU_POLL_INTERVAL_SECS` (default: 2)
    /// - `PLATEAU_PACK_TIMEOUT_SECS` (default: 300)
    /// - `PLATEAU_MAX_TRANSIENT_POLL_FAILURES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_url("PLATEAU_API_URL", DEFAULT_BASE_URL)?,
            api_token: std::env::var("PLATEAU_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new),
            timeout_secs: env_number("PLATEAU_TIMEOUT_SECS", 30)?,
            poll_interval_secs: env_number("PLATEAU_POLL_INTERVAL_SECS", 2)?,
            pack_timeout_secs: env_number("PLATEAU_PACK_TIMEOUT_SECS", 300)?,
            max_transient_poll_failures: env_number("PLATEAU_MAX_TRANSIENT_POLL_FAILURES", 3)?,
        })
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` cannot be parsed.
    pub fn local_mock(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?,
            api_token: None,
            timeout_secs: 5,
            poll_interval_secs: 1,
            pack_timeout_secs: 10,
            max_transient_poll_failures: 3,
        })
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay between packaging status polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Deadline for a packaging job.
    pub fn pack_timeout(&self) -> Duration {
        Duration::from_secs(self.pack_timeout_secs)
    }

    /// Production defaults without consulting the environment.
    pub fn production() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .map_err(|e| ConfigError::InvalidUrl("default".to_string(), e.to_string()))?,
            api_token: None,
            timeout_secs: 30,
            poll_interval_secs: 2,
            pack_timeout_secs: 300,
            max_transient_poll_failures: 3,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_number<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
    #[error("invalid API token: contains characters not allowed in an HTTP header")]
    InvalidToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = PlateauApiConfig::local_mock("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.timeout_secs, 5);
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn default_points_at_production() {
        let cfg = PlateauApiConfig::production().unwrap();
        assert_eq!(cfg.base_url.as_str(), "https://api.plateauview.mlit.go.jp/");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.pack_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn debug_redacts_token() {
        let mut cfg = PlateauApiConfig::production().unwrap();
        cfg.api_token = Some(Zeroizing::new("secret-token".into()));
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("NONEXISTENT_PLATEAU_VAR_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("TEST_BAD_URL_PLATEAU", "not a url");
        let result = env_url("TEST_BAD_URL_PLATEAU", "https://example.com");
        std::env::remove_var("TEST_BAD_URL_PLATEAU");
        assert!(result.is_err());
    }

    #[test]
    fn env_number_rejects_garbage() {
        std::env::set_var("TEST_BAD_NUMBER_PLATEAU", "soon");
        let result: Result<u64, _> = env_number("TEST_BAD_NUMBER_PLATEAU", 3);
        std::env::remove_var("TEST_BAD_NUMBER_PLATEAU");
        assert!(matches!(result, Err(ConfigError::InvalidNumber(_, _))));
    }
}
