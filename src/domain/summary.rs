//! Pipeline summary aggregate.
//!
//! Counts and value sums per lead status. The backend computes it over the
//! whole pipeline, so a single event cannot update it locally; cached copies
//! are invalidated and refetched instead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::lead::LeadStatus;

/// Totals for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub status: LeadStatus,
    pub count: u64,
    pub total_value: Decimal,
}

/// Dashboard pipeline aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub stages: Vec<StageSummary>,
    pub generated_at: DateTime<Utc>,
}

impl PipelineSummary {
    /// Totals for one status, if present.
    #[must_use]
    pub fn stage(&self, status: LeadStatus) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.status == status)
    }

    /// Number of leads across every stage.
    #[must_use]
    pub fn total_leads(&self) -> u64 {
        self.stages.iter().map(|s| s.count).sum()
    }

    /// Value of leads still in the active pipeline.
    #[must_use]
    pub fn open_value(&self) -> Decimal {
        self.stages
            .iter()
            .filter(|s| !s.status.is_closed())
            .map(|s| s.total_value)
            .sum()
    }
}
