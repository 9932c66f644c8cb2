//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!                    │ cache · mutation ·      │
//!                    │ realtime                │
//!                    └───────────┬─────────────┘
//!                   ┌────────────┴────────────┐
//!                   ▼                         ▼
//!             ┌───────────┐            ┌─────────────┐
//!             │   REST    │            │    STOMP    │
//!             │  Adapter  │            │   Adapter   │
//!             └───────────┘            └─────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`CrmApi`] - REST backend (queries and mutations)
//! - [`PushTransport`] - Realtime publish/subscribe channel

pub mod outbound;

pub use outbound::api::CrmApi;
pub use outbound::push::{PushFrame, PushTransport, Topic};
