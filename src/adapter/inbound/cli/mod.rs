//! CLI module graph.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod leads;
pub mod output;
pub mod summary;
pub mod watch;
