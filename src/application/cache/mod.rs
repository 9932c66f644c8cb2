//! Client-side query cache.
//!
//! - [`store::QueryCache`]: versioned entries, patch/invalidate, snapshots and
//!   rollback, fetch tickets, update notifications
//! - [`client::QueryClient`]: stale-while-revalidate reads against the backend
//! - [`edit`]: value edits shared by mutations and push merges

pub mod client;
pub mod edit;
pub mod store;

pub use client::QueryClient;
pub use store::{
    CacheEntry, CacheUpdate, ChangeKind, FetchTicket, PatchReport, PauseId, QueryCache,
    RollbackReport, Snapshot,
};
