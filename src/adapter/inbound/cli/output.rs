//! CLI output formatting.
//!
//! Consistent terminal output with a JSON mode for scripting and a quiet
//! mode. In JSON mode every line on stdout is one `{ "type", "payload" }`
//! object; errors go to stderr.

use std::fmt::Display;
use std::io::IsTerminal;
use std::sync::{OnceLock, RwLock};

use owo_colors::{OwoColorize, Style};
use serde_json::json;

use super::command::ColorChoice;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
    /// Verbosity level (0 = normal, 1+ = increasingly verbose).
    pub verbose: u8,
    /// Emit ANSI colors.
    pub color: bool,
}

impl OutputConfig {
    #[must_use]
    pub fn new(json: bool, quiet: bool, verbose: u8, color: ColorChoice) -> Self {
        let color = match color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        };
        Self {
            json,
            quiet,
            verbose,
            color: color && !json,
        }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    match config_cell().read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn write_config(config: OutputConfig) {
    match config_cell().write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// Check if regular (non-JSON) output should be suppressed.
fn regular_output_suppressed(config: OutputConfig) -> bool {
    !config.json && config.quiet
}

fn emit_json_line(kind: &str, payload: serde_json::Value) {
    println!(
        "{}",
        json!({
            "type": kind,
            "payload": payload,
        })
    );
}

fn paint(value: impl Display, style: Style) -> String {
    if read_config().color {
        value.style(style).to_string()
    } else {
        value.to_string()
    }
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    write_config(config);
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

#[must_use]
pub fn is_quiet() -> bool {
    read_config().quiet
}

/// Global verbosity level from `-v` flags.
#[must_use]
pub fn verbosity() -> u8 {
    read_config().verbose
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    let config = read_config();
    if config.json {
        emit_json_line(
            "header",
            json!({
                "app": "studiosync",
                "version": version,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!(
        "{} {}",
        paint("studiosync", Style::new().bold()),
        paint(version, Style::new().dimmed())
    );
    println!();
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let config = read_config();
    let value = value.to_string();

    if config.json {
        emit_json_line(
            "field",
            json!({
                "label": label,
                "value": value,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {} {}", paint(format!("{label:<14}"), Style::new().dimmed()), value);
}

pub fn success(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("success", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {} {}", paint("✓", Style::new().green()), message);
}

/// Print a warning line. Shown even in quiet mode.
pub fn warning(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("warning", json!({ "message": message }));
        return;
    }

    println!("  {} {}", paint("⚠", Style::new().yellow()), message);
}

/// Print an error line to stderr.
pub fn error(message: &str) {
    let config = read_config();

    if config.json {
        eprintln!(
            "{}",
            json!({
                "type": "error",
                "payload": { "message": message },
            })
        );
        return;
    }

    eprintln!("  {} {}", paint("×", Style::new().red()), message);
}

pub fn section(title: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("section", json!({ "title": title }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!();
    println!("{}", paint(title, Style::new().bold()));
}

/// Print a streaming event line (`watch`).
pub fn event(timestamp: &str, label: &str, message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line(
            "event",
            json!({
                "timestamp": timestamp,
                "label": label,
                "message": message,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!(
        "  {} {} {}",
        paint(timestamp, Style::new().dimmed()),
        paint(label, Style::new().cyan()),
        message
    );
}

pub fn note(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("note", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {}", paint(message, Style::new().dimmed()));
}

pub fn hint(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("hint", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!(
        "  {}: {}",
        paint("hint", Style::new().cyan().dimmed()),
        paint(message, Style::new().dimmed())
    );
}

/// Print multiple lines of content, each indented.
pub fn lines(content: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("lines", json!({ "content": content }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    for line in content.lines() {
        println!("  {line}");
    }
}

/// Emit a JSON value directly (for commands with a custom JSON shape).
pub fn json_output(value: serde_json::Value) {
    println!("{value}");
}

pub fn positive(value: impl Display) -> String {
    paint(value, Style::new().green())
}

pub fn negative(value: impl Display) -> String {
    paint(value, Style::new().red())
}

pub fn highlight(value: impl Display) -> String {
    paint(value, Style::new().cyan())
}

pub fn muted(value: impl Display) -> String {
    paint(value, Style::new().dimmed())
}
