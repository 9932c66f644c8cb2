//! REST backend port.
//!
//! The backend is the authority for every record. Optimistic cache patches
//! only approximate what these calls eventually return.

use async_trait::async_trait;

use crate::domain::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, Lead, LeadFilter, LeadId, LeadPatch,
    LeadStatus, NewCustomer, NewLead, Page, PipelineSummary, QueryKey, QueryShape, QueryValue,
    Resource,
};
use crate::error::{Error, Result};

/// CRM backend operations used by queries and mutations.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// `GET /v1/leads?filters`
    async fn list_leads(&self, filter: &LeadFilter) -> Result<Page<Lead>>;

    /// `GET /v1/leads/{id}`
    async fn get_lead(&self, id: &LeadId) -> Result<Lead>;

    /// `POST /v1/leads`
    async fn create_lead(&self, draft: &NewLead) -> Result<Lead>;

    /// `PATCH /v1/leads/{id}`
    async fn update_lead(&self, id: &LeadId, patch: &LeadPatch) -> Result<Lead>;

    /// `PATCH /v1/leads/{id}` with only the status set.
    async fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<Lead>;

    /// `DELETE /v1/leads/{id}`
    async fn delete_lead(&self, id: &LeadId) -> Result<()>;

    /// `GET /v1/leads/pipeline-summary`
    async fn pipeline_summary(&self) -> Result<PipelineSummary>;

    /// `GET /v1/customers?filters`
    async fn list_customers(&self, filter: &CustomerFilter) -> Result<Page<Customer>>;

    /// `GET /v1/customers/{id}`
    async fn get_customer(&self, id: &CustomerId) -> Result<Customer>;

    /// `POST /v1/customers`
    async fn create_customer(&self, draft: &NewCustomer) -> Result<Customer>;

    /// `PATCH /v1/customers/{id}`
    async fn update_customer(&self, id: &CustomerId, patch: &CustomerPatch) -> Result<Customer>;

    /// `DELETE /v1/customers/{id}`
    async fn delete_customer(&self, id: &CustomerId) -> Result<()>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Resolve a cache key to the matching read call.
    async fn fetch(&self, key: &QueryKey) -> Result<QueryValue> {
        match (&key.resource, &key.shape) {
            (Resource::PipelineSummary, _) => {
                Ok(QueryValue::PipelineSummary(self.pipeline_summary().await?))
            }
            (Resource::Leads, QueryShape::List(d)) => Ok(QueryValue::LeadPage(
                self.list_leads(&LeadFilter::from_descriptor(d)).await?,
            )),
            (Resource::Leads, QueryShape::Detail(id)) => {
                Ok(QueryValue::Lead(self.get_lead(&LeadId::new(id.as_str())).await?))
            }
            (Resource::Customers, QueryShape::List(d)) => Ok(QueryValue::CustomerPage(
                self.list_customers(&CustomerFilter::from_descriptor(d)).await?,
            )),
            (Resource::Customers, QueryShape::Detail(id)) => Ok(QueryValue::Customer(
                self.get_customer(&CustomerId::new(id.as_str())).await?,
            )),
            (resource, QueryShape::Aggregate) => Err(Error::NotFound {
                resource: resource.to_string(),
                id: "aggregate".into(),
            }),
        }
    }
}
