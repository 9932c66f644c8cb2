//! Customer records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::CustomerId;
use super::tax_id::{Nip, Regon};

/// Relationship state of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Vip,
}

impl CustomerStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Inactive, Self::Vip];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Vip => "VIP",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// A customer as served by the backend.
///
/// Tax identifiers are kept as the server sent them; only drafts are
/// validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: CustomerStatus,
    #[serde(default)]
    pub nip: Option<String>,
    #[serde(default)]
    pub regon: Option<String>,
    pub total_spent: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// True if `self` is at least as recent as `other` by server timestamp.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.updated_at >= other.updated_at
    }
}

/// Partial update of a customer (`PATCH /v1/customers/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CustomerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regon: Option<String>,
}

impl CustomerPatch {
    /// Validate the patch and normalize tax identifiers to bare digits.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for an emptied name or an invalid NIP/REGON.
    pub fn validated(mut self) -> Result<Self, DomainError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(DomainError::EmptyField { field: "name" });
        }
        self.nip = normalize(self.nip.as_deref(), Nip::parse, Nip::as_str)?;
        self.regon = normalize(self.regon.as_deref(), Regon::parse, Regon::as_str)?;
        Ok(self)
    }

    /// Apply the set fields to a cached customer.
    pub fn apply_to(&self, customer: &mut Customer) {
        if let Some(name) = &self.name {
            customer.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            customer.email = Some(email.clone());
        }
        if let Some(phone) = &self.phone {
            customer.phone = Some(phone.clone());
        }
        if let Some(status) = self.status {
            customer.status = status;
        }
        if let Some(nip) = &self.nip {
            customer.nip = Some(nip.clone());
        }
        if let Some(regon) = &self.regon {
            customer.regon = Some(regon.clone());
        }
    }
}

/// Draft for `POST /v1/customers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regon: Option<String>,
}

impl NewCustomer {
    /// Validate the draft and normalize tax identifiers to bare digits.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] for an empty name or an invalid NIP/REGON.
    pub fn validated(mut self) -> Result<Self, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyField { field: "name" });
        }
        self.nip = normalize(self.nip.as_deref(), Nip::parse, Nip::as_str)?;
        self.regon = normalize(self.regon.as_deref(), Regon::parse, Regon::as_str)?;
        Ok(self)
    }

    /// Build the placeholder record shown until the server answers.
    #[must_use]
    pub fn to_provisional(&self, id: CustomerId, now: DateTime<Utc>) -> Customer {
        Customer {
            id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            status: CustomerStatus::Active,
            nip: self.nip.clone(),
            regon: self.regon.clone(),
            total_spent: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

fn normalize<T>(
    raw: Option<&str>,
    parse: fn(&str) -> Result<T, DomainError>,
    digits: fn(&T) -> &str,
) -> Result<Option<String>, DomainError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse(s).map(|parsed| Some(digits(&parsed).to_string())),
    }
}
