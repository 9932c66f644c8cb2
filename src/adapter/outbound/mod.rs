//! Outbound adapters (driven side).

pub mod rest;
pub mod stomp;
