//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lead identifier - newtype for type safety.
///
/// Lead ids are opaque strings issued by the backend (`"42"`, `"call-9"`).
/// Records created optimistically carry a temporary id until the server
/// answers; see [`LeadId::temporary`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(String);

impl LeadId {
    /// Create a new `LeadId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a client-side placeholder id for an optimistic insert.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// True when this id was generated locally and is not known to the server.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    /// Get the lead ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LeadId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for LeadId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Customer identifier - newtype for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Create a new `CustomerId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a client-side placeholder id for an optimistic insert.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// True when this id was generated locally and is not known to the server.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    /// Get the customer ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CustomerId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Studio (tenant) identifier.
///
/// Push topics and REST data are scoped per studio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudioId(String);

impl StudioId {
    /// Create a new `StudioId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the studio ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StudioId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for StudioId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

const TEMPORARY_PREFIX: &str = "tmp-";
