//! Handler for the `config` command group.

use std::path::Path;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::API_TOKEN_ENV;
use crate::infrastructure::config::Config;

/// Non-fatal findings about a configuration that parsed and validated.
pub fn warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.api_token.is_none() {
        warnings.push(format!("{API_TOKEN_ENV} is not set; requests are unauthenticated"));
    }
    if config.session.studio_id.is_none() {
        warnings.push("session.studio_id is not set; `watch` needs --studio".to_string());
    }
    if config.cache.refresh_interval().is_none() {
        warnings.push("cache.refresh_interval_secs is 0; stale entries refresh on read only".into());
    }
    warnings
}

/// Execute `config validate`.
pub fn execute_validate(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    let warnings = warnings(&config);

    if output::is_json() {
        output::json_output(json!({
            "command": "config.validate",
            "path": path.display().to_string(),
            "valid": true,
            "warnings": warnings,
        }));
        return Ok(());
    }

    output::section("Config Validation");
    output::field("Path", path.display());
    output::success("Config file is valid");

    if !warnings.is_empty() {
        output::section("Warnings");
        for warning in &warnings {
            output::warning(warning);
        }
    }

    output::hint(&format!(
        "run {} to see effective values",
        output::highlight(format!("studiosync config show -c {}", path.display()))
    ));
    Ok(())
}

/// Execute `config show`.
pub fn execute_show(path: &Path) -> Result<()> {
    let config = Config::load(path)?;

    if output::is_json() {
        output::json_output(json!({
            "command": "config.show",
            "api": {
                "base_url": config.api.base_url,
                "timeout_ms": config.api.timeout_ms,
                "retry_max_attempts": config.api.retry_max_attempts,
            },
            "realtime": {
                "ws_url": config.realtime.ws_url,
                "heartbeat": config.realtime.heartbeat().to_string(),
            },
            "cache": {
                "stale_after_secs": config.cache.stale_after_secs,
                "refresh_interval_secs": config.cache.refresh_interval_secs,
            },
            "session": { "studio_id": config.session.studio_id },
            "token_loaded": config.api_token.is_some(),
        }));
        return Ok(());
    }

    output::section("REST API");
    output::field("Base URL", &config.api.base_url);
    output::field("Timeout", format!("{}ms", config.api.timeout_ms));
    output::field(
        "Retries",
        format!(
            "{} attempts, {}ms backoff",
            config.api.retry_max_attempts, config.api.retry_backoff_ms
        ),
    );

    output::section("Realtime");
    output::field("WebSocket", &config.realtime.ws_url);
    output::field("Heart-beat", config.realtime.heartbeat());
    output::field(
        "Reconnect",
        format!(
            "{}ms..{}ms x{}",
            config.reconnection.initial_delay_ms,
            config.reconnection.max_delay_ms,
            config.reconnection.backoff_multiplier
        ),
    );

    output::section("Cache");
    output::field("Stale after", format!("{}s", config.cache.stale_after_secs));
    output::field(
        "Refresh",
        config
            .cache
            .refresh_interval()
            .map_or_else(|| "disabled".to_string(), |d| format!("every {}s", d.as_secs())),
    );

    output::section("Session");
    output::field(
        "Studio",
        config.session.studio_id.as_deref().unwrap_or("(not set)"),
    );
    if config.api_token.is_some() {
        output::success(&format!("API token loaded from {API_TOKEN_ENV}"));
    } else {
        output::warning(&format!("{API_TOKEN_ENV} not set"));
    }
    Ok(())
}
