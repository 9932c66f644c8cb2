//! REST backend configuration.

use serde::Deserialize;

/// `[api]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://api.example.com`. `/v1/...` is appended.
    #[serde(default)]
    pub base_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Attempts for idempotent reads. Writes are never retried.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Pause between read attempts in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_connect_timeout_ms() -> u64 {
    3_000
}

const fn default_retry_max_attempts() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
