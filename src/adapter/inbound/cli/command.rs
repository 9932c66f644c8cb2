//! Command-line interface definitions.
//!
//! Defines the CLI structure for the studiosync binary using `clap`. Every
//! subcommand reads `--config` (default `studiosync.toml`); the API token
//! comes from `STUDIOSYNC_API_TOKEN`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::LeadStatus;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "studiosync.toml";

/// Studio CRM cache-sync client
#[derive(Parser, Debug)]
#[command(name = "studiosync")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Read and update leads
    #[command(subcommand)]
    Leads(LeadsCommand),

    /// Show the pipeline summary
    Summary,

    /// Follow the studio dashboard feed and merge it into the cache
    Watch(WatchArgs),
}

/// Subcommands for `studiosync config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file for correctness.
    Validate,
    /// Display the effective configuration with defaults applied.
    Show,
}

/// Subcommands for `studiosync leads`.
#[derive(Subcommand, Debug)]
pub enum LeadsCommand {
    /// List leads, newest first.
    List(LeadsListArgs),
    /// Move a lead to another pipeline stage.
    Status(LeadsStatusArgs),
}

/// Arguments for `leads list`.
#[derive(Parser, Debug)]
pub struct LeadsListArgs {
    /// Only leads in this stage (PENDING, IN_PROGRESS, QUOTED, WON, LOST).
    #[arg(long)]
    pub status: Option<LeadStatus>,

    /// Match against name, phone or email.
    #[arg(long)]
    pub search: Option<String>,

    /// Page number, starting at 1.
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Page size.
    #[arg(long, default_value = "20")]
    pub per_page: u32,
}

/// Arguments for `leads status`.
#[derive(Parser, Debug)]
pub struct LeadsStatusArgs {
    /// Lead identifier.
    pub id: String,
    /// Target stage.
    pub status: LeadStatus,
}

/// Arguments for `watch`.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Studio to follow (overrides `session.studio_id`).
    #[arg(long)]
    pub studio: Option<String>,

    /// Stop after this many merged events.
    #[arg(long)]
    pub limit: Option<usize>,
}
