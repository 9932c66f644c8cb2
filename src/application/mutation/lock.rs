//! Per-entity mutation locks.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{CustomerId, LeadId};

/// Record a mutation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Lead(LeadId),
    Customer(CustomerId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lead(id) => write!(f, "lead {id}"),
            Self::Customer(id) => write!(f, "customer {id}"),
        }
    }
}

/// One async mutex per entity, created on demand and dropped once nobody
/// holds or waits for it.
#[derive(Default)]
pub struct EntityLocks {
    locks: DashMap<EntityKey, Arc<Mutex<()>>>,
}

impl EntityLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other mutation holds `key`.
    ///
    /// Cancel safe: a wait dropped before the lock is granted prunes the
    /// entry just like a released guard.
    pub async fn acquire(&self, key: EntityKey) -> EntityGuard<'_> {
        // Declared before the wait so it is dropped after the pending lock future.
        let mut entity = EntityGuard {
            locks: self,
            key,
            guard: None,
        };
        // The map guard must be released before awaiting.
        let mutex = Arc::clone(self.locks.entry(entity.key.clone()).or_default().value());
        entity.guard = Some(mutex.lock_owned().await);
        entity
    }

    /// Number of live lock entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held for the duration of one mutation.
pub struct EntityGuard<'a> {
    locks: &'a EntityLocks,
    key: EntityKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl EntityGuard<'_> {
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }
}

impl Drop for EntityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder, no waiter.
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
