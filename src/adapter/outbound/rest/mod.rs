//! REST backend adapter.

pub mod client;
pub mod settings;

pub use client::RestClient;
pub use settings::ApiConfig;
