//! In-place edits of cached values.
//!
//! Each function returns whether it changed `value`, which is the contract
//! [`QueryCache::patch`](super::QueryCache::patch) expects. They are shared by
//! optimistic mutations and push merges.

use crate::domain::{
    Customer, CustomerFilter, CustomerId, Lead, LeadFilter, LeadId, LeadStatusChange, QueryKey,
    QueryValue,
};

/// Insert `lead` at the head of a first list page whose filter admits it.
///
/// No-op when the page already holds a lead with the same id, so repeated
/// delivery of the same record leaves one entry.
pub fn insert_lead(key: &QueryKey, value: &mut QueryValue, lead: &Lead) -> bool {
    let (Some(descriptor), QueryValue::LeadPage(page)) = (key.filter(), value) else {
        return false;
    };
    if !page.is_first()
        || !LeadFilter::from_descriptor(descriptor).matches(lead)
        || page.contains(|l| l.id == lead.id)
    {
        return false;
    }
    page.push_front(lead.clone());
    true
}

/// Replace a cached lead with `lead` unless the cached copy is newer.
pub fn replace_lead(value: &mut QueryValue, lead: &Lead) -> bool {
    value.for_each_lead_mut(|cached| {
        if cached.id != lead.id || !lead.supersedes(cached) || cached == lead {
            return false;
        }
        *cached = lead.clone();
        true
    })
}

/// Insert or replace, whichever applies to this entry.
pub fn upsert_lead(key: &QueryKey, value: &mut QueryValue, lead: &Lead) -> bool {
    insert_lead(key, value, lead) | replace_lead(value, lead)
}

/// Apply a pushed status change unless the cached lead is newer.
pub fn apply_lead_status(value: &mut QueryValue, change: &LeadStatusChange) -> bool {
    value.for_each_lead_mut(|cached| {
        if cached.id != change.lead_id || cached.updated_at > change.updated_at {
            return false;
        }
        if cached.status == change.status && cached.updated_at == change.updated_at {
            return false;
        }
        cached.apply_status(change.status);
        cached.updated_at = change.updated_at;
        true
    })
}

/// Drop a lead from list pages.
pub fn remove_lead(value: &mut QueryValue, id: &LeadId) -> bool {
    match value {
        QueryValue::LeadPage(page) => page.remove(|l| &l.id == id),
        _ => false,
    }
}

/// Swap a provisional lead for the record the server created.
///
/// If the server record already arrived (e.g. via push), the provisional one
/// is just dropped.
pub fn confirm_lead(value: &mut QueryValue, provisional: &LeadId, created: &Lead) -> bool {
    let QueryValue::LeadPage(page) = value else {
        return false;
    };
    if page.contains(|l| l.id == created.id) {
        return page.remove(|l| &l.id == provisional);
    }
    match page.find_mut(|l| &l.id == provisional) {
        Some(slot) => {
            *slot = created.clone();
            true
        }
        None => false,
    }
}

/// Put the pre-patch copy of lead `id` from `before` back into `current`.
///
/// A cached copy newer than the pre-patch one is kept. A lead missing from
/// the page goes back at its old position. A temporary lead with no pre-patch
/// copy is dropped.
pub fn revert_lead(before: &QueryValue, current: &mut QueryValue, id: &LeadId) -> bool {
    let Some(original) = before.lead(id) else {
        return id.is_temporary() && remove_lead(current, id);
    };
    if current.lead(id).is_none() {
        return match (before, current) {
            (QueryValue::LeadPage(was), QueryValue::LeadPage(page)) => {
                let index = was.data.iter().position(|l| &l.id == id).unwrap_or(0);
                page.insert_at(index, original.clone());
                true
            }
            _ => false,
        };
    }
    current.for_each_lead_mut(|cached| {
        if &cached.id != id || cached.updated_at > original.updated_at || cached == original {
            return false;
        }
        *cached = original.clone();
        true
    })
}

/// Customer counterpart of [`insert_lead`].
pub fn insert_customer(key: &QueryKey, value: &mut QueryValue, customer: &Customer) -> bool {
    let (Some(descriptor), QueryValue::CustomerPage(page)) = (key.filter(), value) else {
        return false;
    };
    if !page.is_first()
        || !CustomerFilter::from_descriptor(descriptor).matches(customer)
        || page.contains(|c| c.id == customer.id)
    {
        return false;
    }
    page.push_front(customer.clone());
    true
}

/// Customer counterpart of [`replace_lead`].
pub fn replace_customer(value: &mut QueryValue, customer: &Customer) -> bool {
    value.for_each_customer_mut(|cached| {
        if cached.id != customer.id || !customer.supersedes(cached) || cached == customer {
            return false;
        }
        *cached = customer.clone();
        true
    })
}

pub fn remove_customer(value: &mut QueryValue, id: &CustomerId) -> bool {
    match value {
        QueryValue::CustomerPage(page) => page.remove(|c| &c.id == id),
        _ => false,
    }
}

/// Customer counterpart of [`confirm_lead`].
pub fn confirm_customer(
    value: &mut QueryValue,
    provisional: &CustomerId,
    created: &Customer,
) -> bool {
    let QueryValue::CustomerPage(page) = value else {
        return false;
    };
    if page.contains(|c| c.id == created.id) {
        return page.remove(|c| &c.id == provisional);
    }
    match page.find_mut(|c| &c.id == provisional) {
        Some(slot) => {
            *slot = created.clone();
            true
        }
        None => false,
    }
}

/// Customer counterpart of [`revert_lead`].
pub fn revert_customer(before: &QueryValue, current: &mut QueryValue, id: &CustomerId) -> bool {
    let Some(original) = before.customer(id) else {
        return id.is_temporary() && remove_customer(current, id);
    };
    if current.customer(id).is_none() {
        return match (before, current) {
            (QueryValue::CustomerPage(was), QueryValue::CustomerPage(page)) => {
                let index = was.data.iter().position(|c| &c.id == id).unwrap_or(0);
                page.insert_at(index, original.clone());
                true
            }
            _ => false,
        };
    }
    current.for_each_customer_mut(|cached| {
        if &cached.id != id || cached.updated_at > original.updated_at || cached == original {
            return false;
        }
        *cached = original.clone();
        true
    })
}
