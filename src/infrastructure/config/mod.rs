//! Infrastructure configuration modules.

pub mod cache;
pub mod logging;
pub mod reconnection;
pub mod settings;

pub use settings::Config;
