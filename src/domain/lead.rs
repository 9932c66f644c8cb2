//! Lead pipeline records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::LeadId;

/// Where a lead ordered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadSource {
    /// Captured automatically from an inbound phone call.
    InboundCall,
    /// Website contact form.
    Website,
    /// Referred by an existing customer.
    Referral,
    /// Entered by staff.
    Manual,
}

/// Pipeline stage of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    /// New lead, nobody has picked it up yet.
    Pending,
    /// Staff are working the lead.
    InProgress,
    /// A quote was sent.
    Quoted,
    /// Converted into a booking.
    Won,
    /// Dropped.
    Lost,
}

impl LeadStatus {
    /// Every status, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Quoted,
        Self::Won,
        Self::Lost,
    ];

    /// Wire representation (`"IN_PROGRESS"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Quoted => "QUOTED",
            Self::Won => "WON",
            Self::Lost => "LOST",
        }
    }

    /// Won and lost leads leave the active pipeline.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// A lead as served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub customer_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    #[serde(default)]
    pub requires_verification: bool,
    pub estimated_value: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Move the lead to `status`, keeping derived flags consistent.
    ///
    /// Picking a lead up (`IN_PROGRESS`) counts as verifying it.
    pub fn apply_status(&mut self, status: LeadStatus) {
        self.status = status;
        if status == LeadStatus::InProgress {
            self.requires_verification = false;
        }
    }

    /// True if `self` is at least as recent as `other` by server timestamp.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.updated_at >= other.updated_at
    }
}

/// Partial update of a lead (`PATCH /v1/leads/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl LeadPatch {
    /// Patch that only changes the estimated value.
    #[must_use]
    pub fn value(amount: Decimal) -> Self {
        Self {
            estimated_value: Some(amount),
            ..Self::default()
        }
    }

    /// Reject patches that would break lead invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for a negative value or an emptied name.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(amount) = self.estimated_value {
            if amount < Decimal::ZERO {
                return Err(DomainError::NegativeAmount { amount });
            }
        }
        if matches!(&self.customer_name, Some(name) if name.trim().is_empty()) {
            return Err(DomainError::EmptyField {
                field: "customerName",
            });
        }
        Ok(())
    }

    /// Apply the set fields to a cached lead.
    pub fn apply_to(&self, lead: &mut Lead) {
        if let Some(name) = &self.customer_name {
            lead.customer_name.clone_from(name);
        }
        if let Some(phone) = &self.phone {
            lead.phone = Some(phone.clone());
        }
        if let Some(email) = &self.email {
            lead.email = Some(email.clone());
        }
        if let Some(amount) = self.estimated_value {
            lead.estimated_value = amount;
        }
        if let Some(notes) = &self.notes {
            lead.notes = Some(notes.clone());
        }
    }
}

/// Draft for `POST /v1/leads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub source: LeadSource,
    pub estimated_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewLead {
    /// # Errors
    ///
    /// Returns [`DomainError`] for an empty name or a negative value.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::EmptyField {
                field: "customerName",
            });
        }
        if self.estimated_value < Decimal::ZERO {
            return Err(DomainError::NegativeAmount {
                amount: self.estimated_value,
            });
        }
        Ok(())
    }

    /// Build the placeholder record shown until the server answers.
    #[must_use]
    pub fn to_provisional(&self, id: LeadId, now: DateTime<Utc>) -> Lead {
        Lead {
            id,
            customer_name: self.customer_name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            source: self.source,
            status: LeadStatus::Pending,
            requires_verification: true,
            estimated_value: self.estimated_value,
            notes: self.notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn lead() -> Lead {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Lead {
            id: LeadId::new("42"),
            customer_name: "Jan Kowalski".into(),
            phone: Some("+48 600 100 200".into()),
            email: None,
            source: LeadSource::InboundCall,
            status: LeadStatus::Pending,
            requires_verification: true,
            estimated_value: dec!(1200),
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_in_progress_clears_verification_flag() {
        let mut lead = lead();
        lead.apply_status(LeadStatus::InProgress);
        assert_eq!(lead.status, LeadStatus::InProgress);
        assert!(!lead.requires_verification);
    }

    #[test]
    fn test_other_statuses_keep_verification_flag() {
        let mut lead = lead();
        lead.apply_status(LeadStatus::Lost);
        assert!(lead.requires_verification);
    }

    #[test]
    fn test_status_parses_loosely() {
        assert_eq!("in-progress".parse::<LeadStatus>(), Ok(LeadStatus::InProgress));
        assert_eq!("WON".parse::<LeadStatus>(), Ok(LeadStatus::Won));
        assert!(matches!(
            "archived".parse::<LeadStatus>(),
            Err(DomainError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_lead_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(lead()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["requiresVerification"], true);
        assert_eq!(json["source"], "INBOUND_CALL");
        assert!(json.get("customerName").is_some());
    }

    #[test]
    fn test_lead_accepts_numeric_amounts() {
        let json = r#"{
            "id": "7", "customerName": "Anna", "source": "WEBSITE",
            "status": "QUOTED", "estimatedValue": 350.5,
            "createdAt": "2026-03-01T09:00:00Z", "updatedAt": "2026-03-01T10:00:00Z"
        }"#;
        let lead: Lead = serde_json::from_str(json).unwrap();
        assert_eq!(lead.estimated_value, dec!(350.5));
        assert!(!lead.requires_verification);
    }

    #[test]
    fn test_patch_validation_and_application() {
        assert!(LeadPatch::value(dec!(-1)).validate().is_err());

        let mut lead = lead();
        let patch = LeadPatch {
            notes: Some("call back after 5".into()),
            ..LeadPatch::value(dec!(900))
        };
        patch.validate().unwrap();
        patch.apply_to(&mut lead);
        assert_eq!(lead.estimated_value, dec!(900));
        assert_eq!(lead.notes.as_deref(), Some("call back after 5"));
        assert_eq!(lead.customer_name, "Jan Kowalski");
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let json = serde_json::to_string(&LeadPatch::value(dec!(10))).unwrap();
        assert_eq!(json, r#"{"estimatedValue":"10"}"#);
    }

    #[test]
    fn test_supersedes_compares_server_timestamps() {
        let older = lead();
        let mut newer = lead();
        newer.updated_at = older.updated_at + chrono::Duration::seconds(1);
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
        assert!(older.supersedes(&older.clone()));
    }
}
