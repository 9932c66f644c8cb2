//! Query cache tuning.

use std::time::Duration;

use serde::Deserialize;

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are served but refetched in the background.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Period of the stale-entry refresher. 0 disables it.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Capacity of the cache change broadcast channel.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

const fn default_stale_after_secs() -> u64 {
    30
}

const fn default_refresh_interval_secs() -> u64 {
    60
}

const fn default_notify_capacity() -> usize {
    1024
}

impl CacheConfig {
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Refresher period, if enabled.
    #[must_use]
    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval_secs))
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            notify_capacity: default_notify_capacity(),
        }
    }
}
