//! Query keys, key filters and cached query values.
//!
//! A [`QueryKey`] addresses one cached server response: a resource plus a
//! shape (a filtered list page, a single record, or an aggregate). Filter
//! parameters live in an ordered map so that equal filters always produce
//! equal, hashable keys regardless of construction order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::customer::{Customer, CustomerStatus};
use super::id::{CustomerId, LeadId};
use super::lead::{Lead, LeadStatus};
use super::page::Page;
use super::summary::PipelineSummary;

/// Default page size used when a filter does not set one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Backend resource a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Leads,
    Customers,
    PipelineSummary,
}

impl Resource {
    /// Path segment under `/v1/`.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Customers => "customers",
            Self::PipelineSummary => "leads/pipeline-summary",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Canonical, ordered set of filter parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterDescriptor(BTreeMap<String, String>);

impl FilterDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter (builder style).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Page number, defaulting to the first page.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.get("page").and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    /// Parameters as `(key, value)` pairs for a query string.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FilterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Shape of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryShape {
    /// One page of a filtered listing.
    List(FilterDescriptor),
    /// A single record by id.
    Detail(String),
    /// A server-computed aggregate.
    Aggregate,
}

/// Composite cache key: `(resource, shape)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    pub resource: Resource,
    pub shape: QueryShape,
}

impl QueryKey {
    #[must_use]
    pub fn lead_list(filter: &LeadFilter) -> Self {
        Self {
            resource: Resource::Leads,
            shape: QueryShape::List(filter.to_descriptor()),
        }
    }

    #[must_use]
    pub fn lead(id: &LeadId) -> Self {
        Self {
            resource: Resource::Leads,
            shape: QueryShape::Detail(id.as_str().to_string()),
        }
    }

    #[must_use]
    pub fn customer_list(filter: &CustomerFilter) -> Self {
        Self {
            resource: Resource::Customers,
            shape: QueryShape::List(filter.to_descriptor()),
        }
    }

    #[must_use]
    pub fn customer(id: &CustomerId) -> Self {
        Self {
            resource: Resource::Customers,
            shape: QueryShape::Detail(id.as_str().to_string()),
        }
    }

    #[must_use]
    pub fn pipeline_summary() -> Self {
        Self {
            resource: Resource::PipelineSummary,
            shape: QueryShape::Aggregate,
        }
    }

    /// Filter parameters for list keys.
    #[must_use]
    pub fn filter(&self) -> Option<&FilterDescriptor> {
        match &self.shape {
            QueryShape::List(filter) => Some(filter),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            QueryShape::List(filter) => write!(f, "{}[{}]", self.resource, filter),
            QueryShape::Detail(id) => write!(f, "{}/{}", self.resource, id),
            QueryShape::Aggregate => write!(f, "{}", self.resource),
        }
    }
}

/// Predicate over cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every key.
    All,
    /// Every key of a resource.
    Resource(Resource),
    /// List pages of a resource.
    Lists(Resource),
    /// The detail entry of one record.
    Detail(Resource, String),
    /// Exactly one key.
    Exact(QueryKey),
    /// Union of filters.
    Any(Vec<KeyFilter>),
}

impl KeyFilter {
    /// Lead list pages plus the lead's own detail entry.
    #[must_use]
    pub fn lead(id: &LeadId) -> Self {
        Self::Any(vec![
            Self::Lists(Resource::Leads),
            Self::Detail(Resource::Leads, id.as_str().to_string()),
        ])
    }

    /// Customer list pages plus the customer's own detail entry.
    #[must_use]
    pub fn customer(id: &CustomerId) -> Self {
        Self::Any(vec![
            Self::Lists(Resource::Customers),
            Self::Detail(Resource::Customers, id.as_str().to_string()),
        ])
    }

    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::All => true,
            Self::Resource(resource) => key.resource == *resource,
            Self::Lists(resource) => {
                key.resource == *resource && matches!(key.shape, QueryShape::List(_))
            }
            Self::Detail(resource, id) => {
                key.resource == *resource
                    && matches!(&key.shape, QueryShape::Detail(detail) if detail == id)
            }
            Self::Exact(exact) => exact == key,
            Self::Any(filters) => filters.iter().any(|f| f.matches(key)),
        }
    }
}

/// Lead list filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for LeadFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl LeadFilter {
    #[must_use]
    pub fn status(status: LeadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn to_descriptor(&self) -> FilterDescriptor {
        let mut d = FilterDescriptor::new()
            .with("page", self.page)
            .with("perPage", self.per_page);
        if let Some(status) = self.status {
            d = d.with("status", status);
        }
        if let Some(search) = &self.search {
            d = d.with("search", search);
        }
        d
    }

    /// Rebuild a filter from a cache key's descriptor. Unknown values are
    /// ignored, which widens the filter.
    #[must_use]
    pub fn from_descriptor(d: &FilterDescriptor) -> Self {
        Self {
            status: d.get("status").and_then(|s| s.parse().ok()),
            search: d.get("search").map(str::to_string),
            page: d.page(),
            per_page: d
                .get("perPage")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PER_PAGE),
        }
    }

    /// Whether `lead` belongs in listings produced by this filter.
    #[must_use]
    pub fn matches(&self, lead: &Lead) -> bool {
        if matches!(self.status, Some(status) if status != lead.status) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [Some(&lead.customer_name), lead.phone.as_ref(), lead.email.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Customer list filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for CustomerFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl CustomerFilter {
    #[must_use]
    pub fn to_descriptor(&self) -> FilterDescriptor {
        let mut d = FilterDescriptor::new()
            .with("page", self.page)
            .with("perPage", self.per_page);
        if let Some(status) = self.status {
            d = d.with("status", status);
        }
        if let Some(search) = &self.search {
            d = d.with("search", search);
        }
        d
    }

    #[must_use]
    pub fn from_descriptor(d: &FilterDescriptor) -> Self {
        Self {
            status: d.get("status").and_then(|s| s.parse().ok()),
            search: d.get("search").map(str::to_string),
            page: d.page(),
            per_page: d
                .get("perPage")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PER_PAGE),
        }
    }

    #[must_use]
    pub fn matches(&self, customer: &Customer) -> bool {
        if matches!(self.status, Some(status) if status != customer.status) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    Some(&customer.name),
                    customer.email.as_ref(),
                    customer.phone.as_ref(),
                    customer.nip.as_ref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

/// A cached server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum QueryValue {
    LeadPage(Page<Lead>),
    Lead(Lead),
    CustomerPage(Page<Customer>),
    Customer(Customer),
    PipelineSummary(PipelineSummary),
}

impl QueryValue {
    /// Run `f` over every lead held by this value. Returns true if any call
    /// reported a change.
    pub fn for_each_lead_mut(&mut self, mut f: impl FnMut(&mut Lead) -> bool) -> bool {
        match self {
            Self::LeadPage(page) => page.data.iter_mut().fold(false, |acc, l| f(l) | acc),
            Self::Lead(lead) => f(lead),
            _ => false,
        }
    }

    /// Run `f` over every customer held by this value. Returns true if any
    /// call reported a change.
    pub fn for_each_customer_mut(&mut self, mut f: impl FnMut(&mut Customer) -> bool) -> bool {
        match self {
            Self::CustomerPage(page) => page.data.iter_mut().fold(false, |acc, c| f(c) | acc),
            Self::Customer(customer) => f(customer),
            _ => false,
        }
    }

    /// Find a cached lead by id.
    #[must_use]
    pub fn lead(&self, id: &LeadId) -> Option<&Lead> {
        match self {
            Self::LeadPage(page) => page.data.iter().find(|l| &l.id == id),
            Self::Lead(lead) if &lead.id == id => Some(lead),
            _ => None,
        }
    }

    /// Find a cached customer by id.
    #[must_use]
    pub fn customer(&self, id: &CustomerId) -> Option<&Customer> {
        match self {
            Self::CustomerPage(page) => page.data.iter().find(|c| &c.id == id),
            Self::Customer(customer) if &customer.id == id => Some(customer),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_lead_page(&self) -> Option<&Page<Lead>> {
        match self {
            Self::LeadPage(page) => Some(page),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_customer_page(&self) -> Option<&Page<Customer>> {
        match self {
            Self::CustomerPage(page) => Some(page),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pipeline_summary(&self) -> Option<&PipelineSummary> {
        match self {
            Self::PipelineSummary(summary) => Some(summary),
            _ => None,
        }
    }
}
