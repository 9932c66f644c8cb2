//! Builders for domain records, push envelopes and transport frames.
//!
//! Fixtures are pinned to 2026-03-01 so `updatedAt` comparisons are
//! predictable.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Customer, CustomerId, CustomerStatus, InboundCall, Lead, LeadId, LeadSource, LeadStatus, Page,
    PipelineSummary, QueryValue, StageSummary, StudioId,
};
use crate::port::{PushFrame, Topic};

/// 2026-03-01 at `hour`:00 UTC.
pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A pending, unverified lead last updated at 10:00.
pub fn lead(id: &str) -> Lead {
    Lead {
        id: LeadId::new(id),
        customer_name: format!("Customer {id}"),
        phone: Some("+48 600 100 200".into()),
        email: None,
        source: LeadSource::Website,
        status: LeadStatus::Pending,
        requires_verification: true,
        estimated_value: Decimal::new(150_000, 2),
        notes: None,
        created_at: at(10),
        updated_at: at(10),
    }
}

/// An active customer last updated at 10:00.
pub fn customer(id: &str) -> Customer {
    Customer {
        id: CustomerId::new(id),
        name: format!("Studio client {id}"),
        email: Some(format!("client{id}@example.com")),
        phone: None,
        status: CustomerStatus::Active,
        nip: None,
        regon: None,
        total_spent: Decimal::ZERO,
        created_at: at(10),
        updated_at: at(10),
    }
}

/// First and only page holding `leads`.
pub fn lead_page(leads: Vec<Lead>) -> QueryValue {
    QueryValue::LeadPage(leads_page(leads))
}

/// First and only page holding `leads`, with room for a full default page.
pub fn leads_page(leads: Vec<Lead>) -> Page<Lead> {
    let mut page = Page::single(leads);
    page.pagination.items_per_page = crate::domain::query::DEFAULT_PER_PAGE;
    page
}

/// First and only page holding `customers`.
pub fn customer_page(customers: Vec<Customer>) -> QueryValue {
    let mut page = Page::single(customers);
    page.pagination.items_per_page = crate::domain::query::DEFAULT_PER_PAGE;
    QueryValue::CustomerPage(page)
}

/// Two pending leads worth 1500, one won lead worth 4000.
pub fn summary() -> PipelineSummary {
    PipelineSummary {
        stages: vec![
            StageSummary {
                status: LeadStatus::Pending,
                count: 2,
                total_value: Decimal::new(150_000, 2),
            },
            StageSummary {
                status: LeadStatus::Won,
                count: 1,
                total_value: Decimal::new(400_000, 2),
            },
        ],
        generated_at: at(10),
    }
}

/// Inbound call received at 12:00.
pub fn inbound_call(id: &str) -> InboundCall {
    InboundCall {
        id: LeadId::new(id),
        phone: "+48 500 600 700".into(),
        caller_name: Some("Jan Kowalski".into()),
        received_at: at(12),
    }
}

/// JSON payload of [`inbound_call`].
pub fn inbound_call_payload(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "phone": "+48 500 600 700",
        "callerName": "Jan Kowalski",
        "receivedAt": "2026-03-01T12:00:00Z",
    })
}

/// Push envelope body with type `kind`.
pub fn envelope(kind: &str, payload: serde_json::Value) -> String {
    serde_json::json!({
        "type": kind,
        "timestamp": "2026-03-01T12:00:00Z",
        "payload": payload,
    })
    .to_string()
}

pub fn studio_topic(studio: &str) -> Topic {
    Topic::studio_dashboard(&StudioId::new(studio))
}

pub fn disconnect_frame(reason: &str) -> PushFrame {
    PushFrame::Disconnected {
        reason: reason.to_string(),
    }
}

/// Message on `studio`'s dashboard topic.
pub fn message_frame(studio: &str, body: &str) -> PushFrame {
    PushFrame::Message {
        topic: studio_topic(studio),
        body: body.to_string(),
    }
}
