//! Handler for the `summary` command.

use rust_decimal::Decimal;
use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::output;
use crate::domain::{LeadStatus, PipelineSummary};
use crate::error::Result;
use crate::infrastructure::bootstrap::Services;

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Stage")]
    status: String,
    #[tabled(rename = "Leads")]
    count: u64,
    #[tabled(rename = "Value")]
    value: String,
}

/// One row per pipeline stage, in pipeline order, including empty stages.
fn rows(summary: &PipelineSummary) -> Vec<StageRow> {
    LeadStatus::ALL
        .into_iter()
        .map(|status| {
            let (count, value) = summary
                .stage(status)
                .map_or((0, Decimal::ZERO), |s| (s.count, s.total_value));
            StageRow {
                status: status.to_string(),
                count,
                value: value.round_dp(2).to_string(),
            }
        })
        .collect()
}

/// Execute `summary`.
pub async fn execute(services: &Services) -> Result<()> {
    let summary = services.client.pipeline_summary().await?;

    if output::is_json() {
        output::json_output(json!({
            "command": "summary",
            "summary": serde_json::to_value(&summary)?,
            "total_leads": summary.total_leads(),
            "open_value": summary.open_value(),
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::section("Pipeline");
    output::lines(&Table::new(rows(&summary)).to_string());
    output::field("Total leads", summary.total_leads());
    output::field("Open value", output::positive(summary.open_value().round_dp(2)));
    output::field(
        "Generated",
        output::muted(summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::summary;

    #[test]
    fn test_rows_cover_every_stage_in_order() {
        let rows = rows(&summary());
        let stages: Vec<&str> = rows.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(stages, ["PENDING", "IN_PROGRESS", "QUOTED", "WON", "LOST"]);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].count, 0);
        assert_eq!(rows[3].value, "4000.00");
    }
}
