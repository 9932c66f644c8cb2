//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`api`] - In-memory [`CrmApi`](crate::port::CrmApi) backend.
//! - [`transport`] - Mock [`PushTransport`](crate::port::PushTransport)
//!   implementations: `ScriptedTransport`, `ChannelTransport`.
//! - [`domain`] - Builders for leads, customers, pages and push envelopes.
//! - [`config`] - Canonical test configurations.

pub mod api;
pub mod config;
pub mod domain;
pub mod transport;
