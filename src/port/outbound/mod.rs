//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the two external collaborators: the REST backend
//! and the realtime push broker.

pub mod api;
pub mod push;
