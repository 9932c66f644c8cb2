//! Realtime studio events.
//!
//! The push channel delivers JSON envelopes:
//!
//! ```json
//! {"type":"LEAD_STATUS_CHANGED","timestamp":"2026-03-01T10:00:00Z","payload":{...}}
//! ```
//!
//! Decoding is two-step: the envelope first, then the payload according to
//! the `type` tag. Unknown tags are reported separately from malformed
//! payloads so callers can log and drop them without treating them as errors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::customer::Customer;
use super::id::LeadId;
use super::lead::{Lead, LeadSource, LeadStatus};

/// Raw envelope as delivered on the topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Payload of `NEW_INBOUND_CALL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCall {
    /// Lead id assigned by the telephony integration (`"call-9"`).
    pub id: LeadId,
    pub phone: String,
    #[serde(default)]
    pub caller_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundCall {
    /// The lead record this call creates on the server.
    #[must_use]
    pub fn to_lead(&self) -> Lead {
        Lead {
            id: self.id.clone(),
            customer_name: self
                .caller_name
                .clone()
                .unwrap_or_else(|| self.phone.clone()),
            phone: Some(self.phone.clone()),
            email: None,
            source: LeadSource::InboundCall,
            status: LeadStatus::Pending,
            requires_verification: true,
            estimated_value: Decimal::ZERO,
            notes: None,
            created_at: self.received_at,
            updated_at: self.received_at,
        }
    }
}

/// Payload of `LEAD_STATUS_CHANGED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStatusChange {
    pub lead_id: LeadId,
    pub status: LeadStatus,
    #[serde(default)]
    pub previous_status: Option<LeadStatus>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of `LEAD_DELETED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRemoval {
    pub lead_id: LeadId,
}

/// Decoded studio event.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    NewInboundCall(InboundCall),
    LeadCreated(Lead),
    LeadUpdated(Lead),
    LeadStatusChanged(LeadStatusChange),
    LeadDeleted(LeadRemoval),
    CustomerUpdated(Customer),
    /// The backend recomputed the pipeline aggregate.
    PipelineUpdated,
}

impl StudioEvent {
    /// Every type tag this client understands.
    pub const KNOWN_TYPES: [&'static str; 7] = [
        "NEW_INBOUND_CALL",
        "LEAD_CREATED",
        "LEAD_UPDATED",
        "LEAD_STATUS_CHANGED",
        "LEAD_DELETED",
        "CUSTOMER_UPDATED",
        "PIPELINE_UPDATED",
    ];

    /// Decode an envelope body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the body is not an envelope, the type tag
    /// is unknown, or the payload does not match the tag.
    pub fn decode(body: &str) -> Result<(PushEnvelope, Self), DecodeError> {
        let envelope: PushEnvelope = serde_json::from_str(body).map_err(DecodeError::Malformed)?;
        let event = Self::from_envelope(&envelope)?;
        Ok((envelope, event))
    }

    /// Decode the payload of an already parsed envelope.
    ///
    /// # Errors
    ///
    /// See [`StudioEvent::decode`].
    pub fn from_envelope(envelope: &PushEnvelope) -> Result<Self, DecodeError> {
        let payload = envelope.payload.clone();
        let kind = envelope.kind.as_str();
        let invalid = |source: serde_json::Error| DecodeError::InvalidPayload {
            kind: kind.to_string(),
            source,
        };
        let event = match kind {
            "NEW_INBOUND_CALL" => Self::NewInboundCall(serde_json::from_value(payload).map_err(invalid)?),
            "LEAD_CREATED" => Self::LeadCreated(serde_json::from_value(payload).map_err(invalid)?),
            "LEAD_UPDATED" => Self::LeadUpdated(serde_json::from_value(payload).map_err(invalid)?),
            "LEAD_STATUS_CHANGED" => {
                Self::LeadStatusChanged(serde_json::from_value(payload).map_err(invalid)?)
            }
            "LEAD_DELETED" => Self::LeadDeleted(serde_json::from_value(payload).map_err(invalid)?),
            "CUSTOMER_UPDATED" => {
                Self::CustomerUpdated(serde_json::from_value(payload).map_err(invalid)?)
            }
            "PIPELINE_UPDATED" => Self::PipelineUpdated,
            other => return Err(DecodeError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    /// Type tag of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NewInboundCall(_) => "NEW_INBOUND_CALL",
            Self::LeadCreated(_) => "LEAD_CREATED",
            Self::LeadUpdated(_) => "LEAD_UPDATED",
            Self::LeadStatusChanged(_) => "LEAD_STATUS_CHANGED",
            Self::LeadDeleted(_) => "LEAD_DELETED",
            Self::CustomerUpdated(_) => "CUSTOMER_UPDATED",
            Self::PipelineUpdated => "PIPELINE_UPDATED",
        }
    }
}

/// Why an envelope could not be turned into a [`StudioEvent`].
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown event type '{0}'")]
    UnknownType(String),

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
