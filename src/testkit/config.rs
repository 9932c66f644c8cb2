//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::infrastructure::config::reconnection::ReconnectionConfig;
use crate::infrastructure::config::Config;

/// Fast reconnection config with zero delays, no waiting in tests.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
        max_consecutive_failures: 3,
        circuit_breaker_cooldown_ms: 0,
    }
}

/// Minimal valid TOML pointing at local endpoints.
pub const MINIMAL_TOML: &str = r#"
[api]
base_url = "http://127.0.0.1:8080"

[realtime]
ws_url = "ws://127.0.0.1:8080/ws"

[session]
studio_id = "studio-1"
"#;

/// [`MINIMAL_TOML`] parsed with a fixed token and fast reconnection.
pub fn minimal() -> Config {
    let mut config = Config::from_toml(MINIMAL_TOML, Some("test-token".into()))
        .expect("minimal test config parses");
    config.reconnection = reconnection();
    config
}
