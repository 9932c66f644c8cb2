//! Folding decoded push events into the query cache.

use crate::application::cache::{edit, QueryCache};
use crate::domain::{KeyFilter, QueryKey, Resource, StudioEvent};

/// What a merge did to the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub patched: usize,
    pub removed: usize,
    pub invalidated: usize,
}

impl MergeReport {
    #[must_use]
    pub fn changed(&self) -> usize {
        self.patched + self.removed + self.invalidated
    }
}

/// Apply `event` to `cache`.
///
/// Entity payloads only replace cached copies that are not newer by server
/// `updatedAt`. Inserts check for an existing id first, so redelivery is
/// harmless. Every lead event marks the pipeline summary stale.
pub fn apply(cache: &QueryCache, event: &StudioEvent) -> MergeReport {
    let mut report = MergeReport::default();
    match event {
        StudioEvent::NewInboundCall(call) => {
            let lead = call.to_lead();
            report.patched = cache
                .patch(&KeyFilter::Lists(Resource::Leads), |key, value| {
                    edit::insert_lead(key, value, &lead)
                })
                .len();
        }
        StudioEvent::LeadCreated(lead) => {
            report.patched = cache
                .patch(&KeyFilter::lead(&lead.id), |key, value| {
                    edit::upsert_lead(key, value, lead)
                })
                .len();
        }
        StudioEvent::LeadUpdated(lead) => {
            report.patched = cache
                .patch(&KeyFilter::lead(&lead.id), |_, value| {
                    edit::replace_lead(value, lead)
                })
                .len();
        }
        StudioEvent::LeadStatusChanged(change) => {
            report.patched = cache
                .patch(&KeyFilter::lead(&change.lead_id), |_, value| {
                    edit::apply_lead_status(value, change)
                })
                .len();
        }
        StudioEvent::LeadDeleted(removal) => {
            report.patched = cache
                .patch(&KeyFilter::Lists(Resource::Leads), |_, value| {
                    edit::remove_lead(value, &removal.lead_id)
                })
                .len();
            report.removed = cache.remove(&KeyFilter::Detail(
                Resource::Leads,
                removal.lead_id.as_str().to_string(),
            ));
        }
        StudioEvent::CustomerUpdated(customer) => {
            report.patched = cache
                .patch(&KeyFilter::customer(&customer.id), |_, value| {
                    edit::replace_customer(value, customer)
                })
                .len();
        }
        StudioEvent::PipelineUpdated => {}
    }

    if touches_pipeline(event) {
        report.invalidated = cache.invalidate(&KeyFilter::Exact(QueryKey::pipeline_summary()));
    }
    report
}

fn touches_pipeline(event: &StudioEvent) -> bool {
    !matches!(event, StudioEvent::CustomerUpdated(_))
}
