//! In-memory [`CrmApi`] backend.
//!
//! Holds leads and customers in insertion order, counts calls per operation
//! and can be told to fail the next call of an operation with an HTTP
//! status. Writes stamp `updatedAt` strictly after the previous value so
//! server-timestamp ordering behaves like the real backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, Lead, LeadFilter, LeadId, LeadPatch,
    LeadStatus, NewCustomer, NewLead, Page, Pagination, PipelineSummary, StageSummary,
};
use crate::error::{Error, Result};
use crate::port::CrmApi;

#[derive(Default)]
struct Store {
    leads: Vec<Lead>,
    customers: Vec<Customer>,
    next_id: u64,
}

/// Backend double that keeps records in memory.
#[derive(Default)]
pub struct InMemoryApi {
    store: Mutex<Store>,
    calls: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<&'static str, u16>>,
    writes: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let api = Self::new();
        api.store.lock().leads = leads;
        api
    }

    pub fn with_customers(customers: Vec<Customer>) -> Self {
        let api = Self::new();
        api.store.lock().customers = customers;
        api
    }

    /// Times `operation` (e.g. `"list_leads"`) was called.
    pub fn calls(&self, operation: &str) -> u32 {
        self.calls.lock().get(operation).copied().unwrap_or(0)
    }

    /// Completed writes in commit order, as `"operation:id"`.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    /// Change a stored lead behind the cache's back.
    pub fn set_status(&self, id: &LeadId, status: LeadStatus) {
        let mut store = self.store.lock();
        if let Some(lead) = store.leads.iter_mut().find(|l| &l.id == id) {
            lead.apply_status(status);
            lead.updated_at = next_stamp(lead.updated_at);
        }
    }

    /// Current server copy of a lead.
    pub fn lead(&self, id: &LeadId) -> Option<Lead> {
        self.store.lock().leads.iter().find(|l| &l.id == id).cloned()
    }

    /// Fail the next call of `operation` with HTTP `status`.
    pub fn fail_next(&self, operation: &'static str, status: u16) {
        self.failures.lock().insert(operation, status);
    }

    /// Delay every write by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;
        match self.failures.lock().remove(operation) {
            Some(status) => Err(Error::Api {
                status,
                message: "injected failure".into(),
            }),
            None => Ok(()),
        }
    }

    async fn enter_write(&self, operation: &'static str) -> Result<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.enter(operation)
    }

    fn record_write(&self, operation: &str, id: &str) {
        self.writes.lock().push(format!("{operation}:{id}"));
    }
}

fn next_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + chrono::Duration::seconds(1))
}

fn paginate<T: Clone>(items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let per_page = per_page.max(1);
    let page = page.max(1);
    let total = items.len() as u64;
    let start = ((page - 1) as usize).saturating_mul(per_page as usize);
    let data = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();
    Page {
        data,
        pagination: Pagination {
            current_page: page,
            total_pages: u32::try_from(total.div_ceil(u64::from(per_page)))
                .unwrap_or(u32::MAX)
                .max(1),
            total_items: total,
            items_per_page: per_page,
        },
    }
}

fn lead_not_found(id: &LeadId) -> Error {
    Error::NotFound {
        resource: "lead".into(),
        id: id.to_string(),
    }
}

fn customer_not_found(id: &CustomerId) -> Error {
    Error::NotFound {
        resource: "customer".into(),
        id: id.to_string(),
    }
}

#[async_trait]
impl CrmApi for InMemoryApi {
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Page<Lead>> {
        self.enter("list_leads")?;
        let matching = self
            .store
            .lock()
            .leads
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page, filter.per_page))
    }

    async fn get_lead(&self, id: &LeadId) -> Result<Lead> {
        self.enter("get_lead")?;
        self.lead(id).ok_or_else(|| lead_not_found(id))
    }

    async fn create_lead(&self, draft: &NewLead) -> Result<Lead> {
        self.enter_write("create_lead").await?;
        let mut store = self.store.lock();
        store.next_id += 1;
        let id = LeadId::new(format!("lead-{}", store.next_id));
        let lead = draft.to_provisional(id, Utc::now());
        store.leads.insert(0, lead.clone());
        drop(store);
        self.record_write("create_lead", lead.id.as_str());
        Ok(lead)
    }

    async fn update_lead(&self, id: &LeadId, patch: &LeadPatch) -> Result<Lead> {
        self.enter_write("update_lead").await?;
        let updated = {
            let mut store = self.store.lock();
            let lead = store
                .leads
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| lead_not_found(id))?;
            patch.apply_to(lead);
            lead.updated_at = next_stamp(lead.updated_at);
            lead.clone()
        };
        self.record_write("update_lead", id.as_str());
        Ok(updated)
    }

    async fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<Lead> {
        self.enter_write("update_lead_status").await?;
        let updated = {
            let mut store = self.store.lock();
            let lead = store
                .leads
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| lead_not_found(id))?;
            lead.apply_status(status);
            lead.updated_at = next_stamp(lead.updated_at);
            lead.clone()
        };
        self.record_write("update_lead_status", id.as_str());
        Ok(updated)
    }

    async fn delete_lead(&self, id: &LeadId) -> Result<()> {
        self.enter_write("delete_lead").await?;
        {
            let mut store = self.store.lock();
            let before = store.leads.len();
            store.leads.retain(|l| &l.id != id);
            if store.leads.len() == before {
                return Err(lead_not_found(id));
            }
        }
        self.record_write("delete_lead", id.as_str());
        Ok(())
    }

    async fn pipeline_summary(&self) -> Result<PipelineSummary> {
        self.enter("pipeline_summary")?;
        let store = self.store.lock();
        let stages = LeadStatus::ALL
            .into_iter()
            .filter_map(|status| {
                let (count, total_value) = store
                    .leads
                    .iter()
                    .filter(|l| l.status == status)
                    .fold((0u64, Decimal::ZERO), |(n, sum), l| {
                        (n + 1, sum + l.estimated_value)
                    });
                (count > 0).then_some(StageSummary {
                    status,
                    count,
                    total_value,
                })
            })
            .collect();
        Ok(PipelineSummary {
            stages,
            generated_at: Utc::now(),
        })
    }

    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Page<Customer>> {
        self.enter("list_customers")?;
        let matching = self
            .store
            .lock()
            .customers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(paginate(matching, filter.page, filter.per_page))
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Customer> {
        self.enter("get_customer")?;
        self.store
            .lock()
            .customers
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| customer_not_found(id))
    }

    async fn create_customer(&self, draft: &NewCustomer) -> Result<Customer> {
        self.enter_write("create_customer").await?;
        let mut store = self.store.lock();
        store.next_id += 1;
        let id = CustomerId::new(format!("customer-{}", store.next_id));
        let customer = draft.to_provisional(id, Utc::now());
        store.customers.insert(0, customer.clone());
        drop(store);
        self.record_write("create_customer", customer.id.as_str());
        Ok(customer)
    }

    async fn update_customer(&self, id: &CustomerId, patch: &CustomerPatch) -> Result<Customer> {
        self.enter_write("update_customer").await?;
        let updated = {
            let mut store = self.store.lock();
            let customer = store
                .customers
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| customer_not_found(id))?;
            patch.apply_to(customer);
            customer.updated_at = next_stamp(customer.updated_at);
            customer.clone()
        };
        self.record_write("update_customer", id.as_str());
        Ok(updated)
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<()> {
        self.enter_write("delete_customer").await?;
        {
            let mut store = self.store.lock();
            let before = store.customers.len();
            store.customers.retain(|c| &c.id != id);
            if store.customers.len() == before {
                return Err(customer_not_found(id));
            }
        }
        self.record_write("delete_customer", id.as_str());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
