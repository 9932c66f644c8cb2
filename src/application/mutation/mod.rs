//! Optimistic mutations.
//!
//! A mutation patches the cache before the backend answers and either
//! confirms the patch (then invalidates what it touched) or rolls it back.
//! Mutations on the same record run one at a time.

pub mod coordinator;
pub mod customer;
pub mod lead;
pub mod lock;

pub use coordinator::{Mutation, MutationCoordinator};
pub use customer::{CreateCustomer, DeleteCustomer, UpdateCustomer};
pub use lead::{ChangeLeadStatus, CreateLead, DeleteLead, UpdateLead};
pub use lock::{EntityGuard, EntityKey, EntityLocks};
