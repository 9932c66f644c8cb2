//! Handlers for the `leads` command group.

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::{LeadsListArgs, LeadsStatusArgs};
use crate::adapter::inbound::cli::output;
use crate::domain::{Lead, LeadFilter, LeadId, Page};
use crate::error::Result;
use crate::infrastructure::bootstrap::Services;

#[derive(Tabled)]
struct LeadRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Customer")]
    customer: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Verify")]
    verify: &'static str,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Lead> for LeadRow {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id.to_string(),
            customer: lead.customer_name.clone(),
            status: lead.status.to_string(),
            value: lead.estimated_value.round_dp(2).to_string(),
            verify: if lead.requires_verification { "yes" } else { "" },
            updated: lead.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn filter_from(args: &LeadsListArgs) -> LeadFilter {
    LeadFilter {
        status: args.status,
        search: args.search.clone().filter(|s| !s.trim().is_empty()),
        page: args.page.max(1),
        per_page: args.per_page.max(1),
    }
}

/// Render a lead page as a table.
pub fn render_table(page: &Page<Lead>) -> String {
    let rows: Vec<LeadRow> = page.data.iter().map(LeadRow::from).collect();
    Table::new(rows).to_string()
}

/// Execute `leads list`.
pub async fn execute_list(services: &Services, args: &LeadsListArgs) -> Result<()> {
    let filter = filter_from(args);
    let page = services.client.leads(&filter).await?;

    if output::is_json() {
        output::json_output(json!({
            "command": "leads.list",
            "leads": serde_json::to_value(&page.data)?,
            "pagination": serde_json::to_value(page.pagination)?,
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    if page.data.is_empty() {
        output::note("No leads match");
        return Ok(());
    }

    output::lines(&render_table(&page));
    output::note(&format!(
        "page {}/{} · {} leads",
        page.pagination.current_page, page.pagination.total_pages, page.pagination.total_items
    ));
    Ok(())
}

/// Execute `leads status`.
///
/// The lead is read through the cache first so the status change runs as an
/// optimistic mutation against a populated entry.
pub async fn execute_status(services: &Services, args: &LeadsStatusArgs) -> Result<()> {
    let id = LeadId::new(args.id.as_str());
    let before = services.client.lead(&id).await?;
    let after = services
        .mutations
        .change_lead_status(id.clone(), args.status)
        .await?;

    if output::is_json() {
        output::json_output(json!({
            "command": "leads.status",
            "id": id.as_str(),
            "previous": before.status,
            "lead": serde_json::to_value(&after)?,
        }));
        return Ok(());
    }

    if before.status == after.status {
        output::note(&format!("Lead {id} is already {}", after.status));
        return Ok(());
    }
    output::success(&format!(
        "Lead {id}: {} → {}",
        output::muted(before.status),
        output::highlight(after.status)
    ));
    if before.requires_verification && !after.requires_verification {
        output::field("Verified", "yes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LeadStatus;
    use crate::testkit::domain::{lead, leads_page};

    #[test]
    fn test_filter_clamps_page_and_drops_blank_search() {
        let args = LeadsListArgs {
            status: Some(LeadStatus::Won),
            search: Some("  ".into()),
            page: 0,
            per_page: 0,
        };
        let filter = filter_from(&args);
        assert_eq!(filter.status, Some(LeadStatus::Won));
        assert_eq!(filter.search, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, 1);
    }

    #[test]
    fn test_table_lists_each_lead() {
        let mut second = lead("2");
        second.apply_status(LeadStatus::InProgress);
        let table = render_table(&leads_page(vec![lead("1"), second]));
        assert!(table.contains("Customer 1"));
        assert!(table.contains("IN_PROGRESS"));
        assert!(table.contains("1500.00"));
    }
}
