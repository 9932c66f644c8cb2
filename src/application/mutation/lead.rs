//! Lead mutations.

use async_trait::async_trait;
use chrono::Utc;

use super::coordinator::Mutation;
use super::lock::EntityKey;
use crate::application::cache::edit;
use crate::domain::error::DomainError;
use crate::domain::{
    KeyFilter, Lead, LeadId, LeadPatch, LeadStatus, NewLead, QueryKey, QueryValue, Resource,
};
use crate::error::Result;
use crate::port::CrmApi;

/// Move a lead to another pipeline stage.
#[derive(Debug, Clone)]
pub struct ChangeLeadStatus {
    pub id: LeadId,
    pub status: LeadStatus,
}

impl ChangeLeadStatus {
    pub fn new(id: LeadId, status: LeadStatus) -> Self {
        Self { id, status }
    }
}

#[async_trait]
impl Mutation for ChangeLeadStatus {
    type Output = Lead;

    fn name(&self) -> &'static str {
        "change_lead_status"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Lead(self.id.clone())
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::lead(&self.id)
    }

    fn apply_optimistic(&self, _key: &QueryKey, value: &mut QueryValue) -> bool {
        value.for_each_lead_mut(|lead| {
            if lead.id != self.id {
                return false;
            }
            let before = (lead.status, lead.requires_verification);
            lead.apply_status(self.status);
            before != (lead.status, lead.requires_verification)
        })
    }

    fn apply_confirmed(&self, output: &Lead, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::replace_lead(value, output)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_lead(before, current, &self.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<Lead> {
        api.update_lead_status(&self.id, self.status).await
    }
}

/// Edit lead fields (value, notes, contact data).
#[derive(Debug, Clone)]
pub struct UpdateLead {
    pub id: LeadId,
    pub patch: LeadPatch,
}

impl UpdateLead {
    pub fn new(id: LeadId, patch: LeadPatch) -> Self {
        Self { id, patch }
    }
}

#[async_trait]
impl Mutation for UpdateLead {
    type Output = Lead;

    fn name(&self) -> &'static str {
        "update_lead"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Lead(self.id.clone())
    }

    fn validate(&self) -> std::result::Result<(), DomainError> {
        self.patch.validate()
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::lead(&self.id)
    }

    fn apply_optimistic(&self, _key: &QueryKey, value: &mut QueryValue) -> bool {
        value.for_each_lead_mut(|lead| {
            if lead.id != self.id {
                return false;
            }
            let before = lead.clone();
            self.patch.apply_to(lead);
            *lead != before
        })
    }

    fn apply_confirmed(&self, output: &Lead, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::replace_lead(value, output)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_lead(before, current, &self.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<Lead> {
        api.update_lead(&self.id, &self.patch).await
    }
}

/// Create a lead, shown at the head of matching lists under a temporary id
/// until the server answers.
#[derive(Debug, Clone)]
pub struct CreateLead {
    draft: NewLead,
    provisional: Lead,
}

impl CreateLead {
    pub fn new(draft: NewLead) -> Self {
        let provisional = draft.to_provisional(LeadId::temporary(), Utc::now());
        Self { draft, provisional }
    }

    /// Temporary id of the placeholder record.
    #[must_use]
    pub fn provisional_id(&self) -> &LeadId {
        &self.provisional.id
    }
}

#[async_trait]
impl Mutation for CreateLead {
    type Output = Lead;

    fn name(&self) -> &'static str {
        "create_lead"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Lead(self.provisional.id.clone())
    }

    fn validate(&self) -> std::result::Result<(), DomainError> {
        self.draft.validate()
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::Lists(Resource::Leads)
    }

    fn apply_optimistic(&self, key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::insert_lead(key, value, &self.provisional)
    }

    fn apply_confirmed(&self, output: &Lead, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::confirm_lead(value, &self.provisional.id, output)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_lead(before, current, &self.provisional.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<Lead> {
        api.create_lead(&self.draft).await
    }
}

/// Delete a lead; it disappears from list pages immediately.
#[derive(Debug, Clone)]
pub struct DeleteLead {
    pub id: LeadId,
}

impl DeleteLead {
    pub fn new(id: LeadId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Mutation for DeleteLead {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_lead"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Lead(self.id.clone())
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::Lists(Resource::Leads)
    }

    fn evicts(&self) -> Option<KeyFilter> {
        Some(KeyFilter::Detail(Resource::Leads, self.id.as_str().to_string()))
    }

    fn apply_optimistic(&self, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::remove_lead(value, &self.id)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_lead(before, current, &self.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<()> {
        api.delete_lead(&self.id).await
    }
}
