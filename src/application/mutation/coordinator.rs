//! Optimistic mutation protocol.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::customer::{CreateCustomer, DeleteCustomer, UpdateCustomer};
use super::lead::{ChangeLeadStatus, CreateLead, DeleteLead, UpdateLead};
use super::lock::{EntityKey, EntityLocks};
use crate::application::cache::{PauseId, QueryCache, QueryClient, RollbackReport, Snapshot};
use crate::domain::error::DomainError;
use crate::domain::{
    Customer, CustomerId, CustomerPatch, KeyFilter, Lead, LeadId, LeadPatch, LeadStatus,
    NewCustomer, NewLead, QueryKey, QueryValue,
};
use crate::error::{MutationError, Result};
use crate::port::CrmApi;

/// A remote write with a local optimistic preview.
#[async_trait]
pub trait Mutation: Send + Sync {
    /// What the server returns on success.
    type Output: Send;

    /// Operation name for logs and errors.
    fn name(&self) -> &'static str;

    /// Entity whose mutations must not interleave with this one.
    fn entity(&self) -> EntityKey;

    /// Reject bad input before the cache is touched.
    fn validate(&self) -> std::result::Result<(), DomainError> {
        Ok(())
    }

    /// Entries the optimistic patch may change.
    fn affected(&self) -> KeyFilter;

    /// Entries marked stale once the server confirmed the write.
    fn invalidates(&self) -> KeyFilter {
        KeyFilter::Any(vec![
            self.affected(),
            KeyFilter::Exact(QueryKey::pipeline_summary()),
        ])
    }

    /// Entries evicted once the server confirmed the write.
    fn evicts(&self) -> Option<KeyFilter> {
        None
    }

    /// Optimistic edit of one affected entry. Returns whether it changed.
    fn apply_optimistic(&self, key: &QueryKey, value: &mut QueryValue) -> bool;

    /// Fold the server's answer into one affected entry.
    fn apply_confirmed(&self, _output: &Self::Output, _key: &QueryKey, _value: &mut QueryValue) -> bool {
        false
    }

    /// Put the pre-patch state of this mutation's record back into an entry
    /// someone else wrote after the optimistic patch. Returns whether it
    /// changed `current`.
    fn revert(&self, _key: &QueryKey, _before: &QueryValue, _current: &mut QueryValue) -> bool {
        false
    }

    /// Perform the remote write.
    async fn commit(&self, api: &dyn CrmApi) -> Result<Self::Output>;
}

/// Runs [`Mutation`]s against the shared cache.
///
/// Per mutation: serialize on the entity, pause background fetches of the
/// affected keys, snapshot, patch, call the backend, then either confirm and
/// invalidate or roll back.
pub struct MutationCoordinator {
    cache: Arc<QueryCache>,
    api: Arc<dyn CrmApi>,
    locks: EntityLocks,
}

impl MutationCoordinator {
    pub fn new(cache: Arc<QueryCache>, api: Arc<dyn CrmApi>) -> Self {
        Self {
            cache,
            api,
            locks: EntityLocks::new(),
        }
    }

    /// Coordinator sharing a query client's cache and backend.
    #[must_use]
    pub fn for_client(client: &QueryClient) -> Self {
        Self::new(Arc::clone(client.cache()), Arc::clone(client.api()))
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Number of entities with a mutation running or queued.
    #[must_use]
    pub fn entities_locked(&self) -> usize {
        self.locks.len()
    }

    /// Run `mutation` to completion.
    ///
    /// # Errors
    ///
    /// [`MutationError::Invalid`] if validation fails (cache untouched);
    /// [`MutationError::Rejected`] if the backend call failed (cache rolled
    /// back). Rejected mutations are not retried. Dropping the future before
    /// the backend answers also rolls back, and marks the keys stale.
    pub async fn run<M: Mutation>(&self, mutation: &M) -> std::result::Result<M::Output, MutationError> {
        mutation.validate()?;

        let operation = mutation.name();
        let entity = mutation.entity();
        let _entity_guard = self.locks.acquire(entity.clone()).await;

        let affected = mutation.affected();
        let pause = FetchPause::new(&self.cache, affected.clone());

        let mut snapshot = self.cache.snapshot(&affected);
        let patched = self
            .cache
            .patch(&affected, |key, value| mutation.apply_optimistic(key, value));
        snapshot.mark_patched(&patched);
        debug!(
            operation,
            entity = %entity,
            snapshotted = snapshot.len(),
            patched = patched.len(),
            "Applied optimistic patch"
        );
        let pending = PendingRollback::new(&self.cache, mutation, snapshot);

        let outcome = mutation.commit(self.api.as_ref()).await;

        match outcome {
            Ok(output) => {
                pending.disarm();
                drop(pause);
                self.cache
                    .patch(&affected, |key, value| mutation.apply_confirmed(&output, key, value));
                if let Some(evict) = mutation.evicts() {
                    self.cache.remove(&evict);
                }
                let invalidated = self.cache.invalidate(&mutation.invalidates());
                info!(operation, entity = %entity, invalidated, "Mutation confirmed");
                Ok(output)
            }
            Err(error) => {
                let report = pending.rollback();
                drop(pause);
                let restored = report.restored + report.reverted;
                warn!(
                    operation,
                    entity = %entity,
                    restored,
                    invalidated = report.invalidated,
                    error = %error,
                    "Mutation rejected, rolled back"
                );
                Err(MutationError::Rejected {
                    operation,
                    restored,
                    source: Box::new(error),
                })
            }
        }
    }
}

impl MutationCoordinator {
    pub async fn change_lead_status(
        &self,
        id: LeadId,
        status: LeadStatus,
    ) -> std::result::Result<Lead, MutationError> {
        self.run(&ChangeLeadStatus::new(id, status)).await
    }

    pub async fn update_lead(
        &self,
        id: LeadId,
        patch: LeadPatch,
    ) -> std::result::Result<Lead, MutationError> {
        self.run(&UpdateLead::new(id, patch)).await
    }

    pub async fn create_lead(&self, draft: NewLead) -> std::result::Result<Lead, MutationError> {
        self.run(&CreateLead::new(draft)).await
    }

    pub async fn delete_lead(&self, id: LeadId) -> std::result::Result<(), MutationError> {
        self.run(&DeleteLead::new(id)).await
    }

    pub async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> std::result::Result<Customer, MutationError> {
        self.run(&UpdateCustomer::new(id, patch)?).await
    }

    pub async fn create_customer(
        &self,
        draft: NewCustomer,
    ) -> std::result::Result<Customer, MutationError> {
        self.run(&CreateCustomer::new(draft)?).await
    }

    pub async fn delete_customer(&self, id: CustomerId) -> std::result::Result<(), MutationError> {
        self.run(&DeleteCustomer::new(id)).await
    }
}

/// Optimistic patch awaiting the backend's answer.
///
/// Dropped while still armed, i.e. when the future running the mutation is
/// cancelled mid-commit, it rolls the patch back and marks the mutation's
/// keys stale, since the write may or may not have reached the server.
struct PendingRollback<'a, M: Mutation> {
    cache: &'a QueryCache,
    mutation: &'a M,
    snapshot: Option<Snapshot>,
}

impl<'a, M: Mutation> PendingRollback<'a, M> {
    fn new(cache: &'a QueryCache, mutation: &'a M, snapshot: Snapshot) -> Self {
        Self {
            cache,
            mutation,
            snapshot: Some(snapshot),
        }
    }

    /// The write was confirmed; keep the patch.
    fn disarm(mut self) {
        self.snapshot = None;
    }

    fn rollback(mut self) -> RollbackReport {
        self.snapshot
            .take()
            .map(|snapshot| self.restore(&snapshot))
            .unwrap_or_default()
    }

    fn restore(&self, snapshot: &Snapshot) -> RollbackReport {
        let mutation = self.mutation;
        self.cache.rollback_with(snapshot, |key, before, current| {
            mutation.revert(key, before, current)
        })
    }
}

impl<M: Mutation> Drop for PendingRollback<'_, M> {
    fn drop(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        let report = self.restore(&snapshot);
        let invalidated = self.cache.invalidate(&self.mutation.invalidates());
        warn!(
            operation = self.mutation.name(),
            entity = %self.mutation.entity(),
            restored = report.restored + report.reverted,
            invalidated,
            "Mutation abandoned, rolled back"
        );
    }
}

/// Background fetch pause, lifted on drop.
struct FetchPause<'a> {
    cache: &'a QueryCache,
    id: PauseId,
}

impl<'a> FetchPause<'a> {
    fn new(cache: &'a QueryCache, filter: KeyFilter) -> Self {
        let id = cache.pause_fetches(filter);
        Self { cache, id }
    }
}

impl Drop for FetchPause<'_> {
    fn drop(&mut self) {
        self.cache.resume_fetches(self.id);
    }
}
