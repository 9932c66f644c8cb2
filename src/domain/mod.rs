//! Backend-agnostic domain types: records, query keys and realtime events.

pub mod customer;
pub mod error;
pub mod event;
pub mod id;
pub mod lead;
pub mod page;
pub mod query;
pub mod summary;
pub mod tax_id;

pub use customer::{Customer, CustomerPatch, CustomerStatus, NewCustomer};
pub use event::{DecodeError, InboundCall, LeadStatusChange, PushEnvelope, StudioEvent};
pub use id::{CustomerId, LeadId, StudioId};
pub use lead::{Lead, LeadPatch, LeadSource, LeadStatus, NewLead};
pub use page::{Page, Pagination};
pub use query::{
    CustomerFilter, FilterDescriptor, KeyFilter, LeadFilter, QueryKey, QueryShape, QueryValue,
    Resource,
};
pub use summary::{PipelineSummary, StageSummary};
