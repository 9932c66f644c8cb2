//! Application configuration loading and validation.
//!
//! [`Config`] aggregates every section of `studiosync.toml`. The API token
//! is never read from the file; it comes from `STUDIOSYNC_API_TOKEN`.
//!
//! # Example
//!
//! ```no_run
//! use studiosync::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("studiosync.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::cache::CacheConfig;
use super::logging::{LoggingConfig, LOG_FORMATS};
use super::reconnection::ReconnectionConfig;
use crate::adapter::outbound::rest::ApiConfig;
use crate::adapter::outbound::stomp::RealtimeConfig;
use crate::application::realtime::Session;
use crate::domain::StudioId;
use crate::error::{ConfigError, Result};

/// Environment variable holding the bearer token.
pub const API_TOKEN_ENV: &str = "STUDIOSYNC_API_TOKEN";

/// `[session]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Studio whose dashboard topic `watch` subscribes to.
    #[serde(default)]
    pub studio_id: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// REST backend.
    #[serde(default)]
    pub api: ApiConfig,

    /// STOMP push endpoint.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Push reconnection backoff and circuit breaker.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Bearer token from [`API_TOKEN_ENV`].
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Config {
    /// Parse configuration from TOML content, taking the API token from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let token = std::env::var(API_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::from_toml(content, token)
    }

    /// Parse configuration from TOML content with an explicit token.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn from_toml(content: &str, api_token: Option<String>) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.api_token = api_token;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed,
    /// or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Session for realtime subscriptions.
    #[must_use]
    pub fn session(&self) -> Session {
        Session {
            studio_id: self.session.studio_id.as_deref().map(StudioId::new),
            token: self.api_token.clone(),
        }
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }

    fn validate(&self) -> Result<()> {
        validate_url(&self.api.base_url, "api.base_url", &["http", "https"])?;
        validate_url(&self.realtime.ws_url, "realtime.ws_url", &["ws", "wss"])?;

        if self.api.timeout_ms == 0 {
            return Err(invalid("api.timeout_ms", "must be greater than 0"));
        }
        if self.api.retry_max_attempts == 0 {
            return Err(invalid("api.retry_max_attempts", "must be greater than 0"));
        }
        if self.realtime.connect_timeout_ms == 0 {
            return Err(invalid("realtime.connect_timeout_ms", "must be greater than 0"));
        }
        if self.cache.stale_after_secs == 0 {
            return Err(invalid("cache.stale_after_secs", "must be greater than 0"));
        }
        if self.cache.notify_capacity == 0 {
            return Err(invalid("cache.notify_capacity", "must be greater than 0"));
        }

        let reconnection = &self.reconnection;
        if reconnection.initial_delay_ms == 0 {
            return Err(invalid("reconnection.initial_delay_ms", "must be greater than 0"));
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(invalid("reconnection.max_delay_ms", "must be >= initial_delay_ms"));
        }
        if reconnection.backoff_multiplier < 1.0 {
            return Err(invalid("reconnection.backoff_multiplier", "must be >= 1.0"));
        }
        if reconnection.max_consecutive_failures == 0 {
            return Err(invalid(
                "reconnection.max_consecutive_failures",
                "must be greater than 0",
            ));
        }
        if reconnection.circuit_breaker_cooldown_ms == 0 {
            return Err(invalid(
                "reconnection.circuit_breaker_cooldown_ms",
                "must be greater than 0",
            ));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", "must be 'pretty' or 'json'"));
        }
        if matches!(&self.session.studio_id, Some(id) if id.trim().is_empty()) {
            return Err(invalid("session.studio_id", "cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}

fn validate_url(raw: &str, field: &'static str, schemes: &[&str]) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(ConfigError::MissingField { field }.into());
    }
    let url = url::Url::parse(raw).map_err(|e| invalid(field, &e.to_string()))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(
            field,
            &format!("scheme must be one of {}", schemes.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const MINIMAL: &str = r#"
        [api]
        base_url = "https://api.example.com"

        [realtime]
        ws_url = "wss://api.example.com/ws"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL, None).unwrap();
        assert_eq!(config.api.retry_max_attempts, 3);
        assert_eq!(config.cache.stale_after_secs, 30);
        assert_eq!(config.realtime.heartbeat_outgoing_ms, 10_000);
        assert_eq!(config.reconnection.initial_delay_ms, 500);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.session.studio_id.is_none());
    }

    #[test]
    fn test_missing_urls_are_reported_by_name() {
        let err = Config::from_toml("", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField {
                field: "api.base_url"
            })
        ));

        let err = Config::from_toml("[api]\nbase_url = \"https://x\"\n", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField {
                field: "realtime.ws_url"
            })
        ));
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        let toml = r#"
            [api]
            base_url = "https://api.example.com"
            [realtime]
            ws_url = "https://api.example.com/ws"
        "#;
        assert!(matches!(
            Config::from_toml(toml, None),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "realtime.ws_url",
                ..
            }))
        ));
    }

    #[test]
    fn test_reconnection_bounds_checked() {
        let toml = format!("{MINIMAL}\n[reconnection]\ninitial_delay_ms = 1000\nmax_delay_ms = 10\n");
        assert!(matches!(
            Config::from_toml(&toml, None),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "reconnection.max_delay_ms",
                ..
            }))
        ));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let toml = format!("{MINIMAL}\n[logging]\nformat = \"xml\"\n");
        assert!(matches!(
            Config::from_toml(&toml, None),
            Err(Error::Config(ConfigError::InvalidValue {
                field: "logging.format",
                ..
            }))
        ));
    }

    #[test]
    fn test_session_combines_studio_and_token() {
        let toml = format!("{MINIMAL}\n[session]\nstudio_id = \"17\"\n");
        let config = Config::from_toml(&toml, Some("secret".into())).unwrap();
        let session = config.session();
        assert!(session.is_authenticated());
        assert_eq!(
            session.dashboard_topic().unwrap().as_str(),
            "/topic/studio.17.dashboard"
        );

        let anonymous = Config::from_toml(&toml, None).unwrap().session();
        assert!(!anonymous.is_authenticated());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::from_toml("[api", None),
            Err(Error::Config(ConfigError::Parse(_)))
        ));
    }
}
