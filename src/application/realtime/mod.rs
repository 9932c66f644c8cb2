//! Realtime merge of server push events.
//!
//! - [`connection::PushConnection`]: reconnecting transport wrapper with an
//!   observable state machine
//! - [`hub::RealtimeHub`]: task owning the connection, topic refcounts
//! - [`dispatch::EventDispatcher`]: envelope decoding and routing
//! - [`merge`]: cache updates per event type

pub mod connection;
pub mod dispatch;
pub mod hub;
pub mod merge;

pub use connection::{ConnectionState, PushConnection, PushMessage};
pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use hub::{RealtimeHub, Session, Subscription};
pub use merge::MergeReport;
