//! Customer mutations.
//!
//! Drafts and patches carrying a NIP or REGON are validated when the
//! mutation is built, so an invalid tax id never reaches the cache.

use async_trait::async_trait;
use chrono::Utc;

use super::coordinator::Mutation;
use super::lock::EntityKey;
use crate::application::cache::edit;
use crate::domain::error::DomainError;
use crate::domain::{
    Customer, CustomerId, CustomerPatch, KeyFilter, NewCustomer, QueryKey, QueryValue, Resource,
};
use crate::error::Result;
use crate::port::CrmApi;

#[derive(Debug, Clone)]
pub struct UpdateCustomer {
    id: CustomerId,
    patch: CustomerPatch,
}

impl UpdateCustomer {
    /// # Errors
    ///
    /// Returns [`DomainError`] for an emptied name or an invalid tax id.
    pub fn new(id: CustomerId, patch: CustomerPatch) -> std::result::Result<Self, DomainError> {
        Ok(Self {
            id,
            patch: patch.validated()?,
        })
    }
}

#[async_trait]
impl Mutation for UpdateCustomer {
    type Output = Customer;

    fn name(&self) -> &'static str {
        "update_customer"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Customer(self.id.clone())
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::customer(&self.id)
    }

    fn invalidates(&self) -> KeyFilter {
        self.affected()
    }

    fn apply_optimistic(&self, _key: &QueryKey, value: &mut QueryValue) -> bool {
        value.for_each_customer_mut(|customer| {
            if customer.id != self.id {
                return false;
            }
            let before = customer.clone();
            self.patch.apply_to(customer);
            *customer != before
        })
    }

    fn apply_confirmed(&self, output: &Customer, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::replace_customer(value, output)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_customer(before, current, &self.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<Customer> {
        api.update_customer(&self.id, &self.patch).await
    }
}

#[derive(Debug, Clone)]
pub struct CreateCustomer {
    draft: NewCustomer,
    provisional: Customer,
}

impl CreateCustomer {
    /// # Errors
    ///
    /// Returns [`DomainError`] for an empty name or an invalid tax id.
    pub fn new(draft: NewCustomer) -> std::result::Result<Self, DomainError> {
        let draft = draft.validated()?;
        let provisional = draft.to_provisional(CustomerId::temporary(), Utc::now());
        Ok(Self { draft, provisional })
    }

    #[must_use]
    pub fn provisional_id(&self) -> &CustomerId {
        &self.provisional.id
    }

    /// Draft as it will be sent, tax ids normalized to digits.
    #[must_use]
    pub fn draft(&self) -> &NewCustomer {
        &self.draft
    }
}

#[async_trait]
impl Mutation for CreateCustomer {
    type Output = Customer;

    fn name(&self) -> &'static str {
        "create_customer"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Customer(self.provisional.id.clone())
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::Lists(Resource::Customers)
    }

    fn invalidates(&self) -> KeyFilter {
        self.affected()
    }

    fn apply_optimistic(&self, key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::insert_customer(key, value, &self.provisional)
    }

    fn apply_confirmed(&self, output: &Customer, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::confirm_customer(value, &self.provisional.id, output)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_customer(before, current, &self.provisional.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<Customer> {
        api.create_customer(&self.draft).await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteCustomer {
    id: CustomerId,
}

impl DeleteCustomer {
    pub fn new(id: CustomerId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Mutation for DeleteCustomer {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_customer"
    }

    fn entity(&self) -> EntityKey {
        EntityKey::Customer(self.id.clone())
    }

    fn affected(&self) -> KeyFilter {
        KeyFilter::Lists(Resource::Customers)
    }

    fn invalidates(&self) -> KeyFilter {
        self.affected()
    }

    fn evicts(&self) -> Option<KeyFilter> {
        Some(KeyFilter::Detail(
            Resource::Customers,
            self.id.as_str().to_string(),
        ))
    }

    fn apply_optimistic(&self, _key: &QueryKey, value: &mut QueryValue) -> bool {
        edit::remove_customer(value, &self.id)
    }

    fn revert(&self, _key: &QueryKey, before: &QueryValue, current: &mut QueryValue) -> bool {
        edit::revert_customer(before, current, &self.id)
    }

    async fn commit(&self, api: &dyn CrmApi) -> Result<()> {
        api.delete_customer(&self.id).await
    }
}
