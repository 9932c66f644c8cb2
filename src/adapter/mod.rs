//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`] - Driving side: the operator CLI
//! - [`outbound`] - Driven side: REST backend and STOMP push transport

pub mod inbound;
pub mod outbound;
