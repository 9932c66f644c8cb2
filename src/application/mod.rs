//! Application services.
//!
//! The query cache, the optimistic mutation protocol, and the realtime
//! merge all share one [`cache::QueryCache`].

pub mod cache;
pub mod mutation;
pub mod realtime;
