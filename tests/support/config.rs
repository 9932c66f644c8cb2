use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A complete, valid configuration.
pub const VALID_TOML: &str = r#"
[api]
base_url = "https://crm.example.com"
timeout_ms = 5000

[realtime]
ws_url = "wss://crm.example.com/ws"

[cache]
stale_after_secs = 15
refresh_interval_secs = 0

[reconnection]
initial_delay_ms = 500
max_delay_ms = 10000

[logging]
level = "debug"
format = "json"

[session]
studio_id = "17"
"#;

/// Write `contents` to `studiosync.toml` in a fresh temp dir.
///
/// Keep the returned [`TempDir`] alive for as long as the file is needed.
pub fn write_temp_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("studiosync.toml");
    fs::write(&path, contents).expect("write temp config");
    (dir, path)
}
