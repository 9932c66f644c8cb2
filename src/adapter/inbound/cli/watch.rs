//! Handler for the `watch` command.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::WatchArgs;
use crate::adapter::inbound::cli::output;
use crate::application::realtime::ConnectionState;
use crate::domain::{StudioEvent, StudioId};
use crate::error::Result;
use crate::infrastructure::bootstrap::{spawn_realtime, Services};
use crate::infrastructure::config::Config;

/// One-line description of a merged event.
pub fn describe(event: &StudioEvent) -> String {
    match event {
        StudioEvent::NewInboundCall(call) => format!(
            "{} called from {} (lead {})",
            call.caller_name.as_deref().unwrap_or("Unknown caller"),
            call.phone,
            call.id
        ),
        StudioEvent::LeadCreated(lead) => format!("lead {} created for {}", lead.id, lead.customer_name),
        StudioEvent::LeadUpdated(lead) => format!("lead {} updated ({})", lead.id, lead.status),
        StudioEvent::LeadStatusChanged(change) => match change.previous_status {
            Some(previous) => format!("lead {}: {previous} → {}", change.lead_id, change.status),
            None => format!("lead {} → {}", change.lead_id, change.status),
        },
        StudioEvent::LeadDeleted(removal) => format!("lead {} deleted", removal.lead_id),
        StudioEvent::CustomerUpdated(customer) => {
            format!("customer {} updated ({})", customer.id, customer.name)
        }
        StudioEvent::PipelineUpdated => "pipeline summary recomputed".to_string(),
    }
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
    }
}

/// Execute `watch` until Ctrl-C or `--limit` events.
pub async fn execute(config: &Config, services: &Services, args: &WatchArgs) -> Result<()> {
    let mut session = config.session();
    if let Some(studio) = &args.studio {
        session.studio_id = Some(StudioId::new(studio.as_str()));
    }
    let topic = session.dashboard_topic()?;

    let refresher = config
        .cache
        .refresh_interval()
        .map(|interval| services.client.spawn_refresher(interval));
    let (hub, mut events, task) = spawn_realtime(config, services.cache().clone());
    let mut state = hub.watch_state();
    let subscription = hub.subscribe(&session).await?;

    output::field("Topic", &topic);
    output::note("Press Ctrl-C to stop");

    let mut seen = 0usize;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    seen += 1;
                    let now = chrono::Utc::now().format("%H:%M:%S").to_string();
                    output::event(&now, event.kind(), &describe(&event));
                    if args.limit.is_some_and(|limit| seen >= limit) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event output lagged behind the hub");
                }
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                let now = chrono::Utc::now().format("%H:%M:%S").to_string();
                output::event(&now, "connection", state_label(current));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    hub.unsubscribe(subscription).await?;
    hub.shutdown().await?;
    let _ = task.await;
    if let Some(refresher) = refresher {
        refresher.abort();
    }
    output::field("Events", seen);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeadId, LeadStatus, LeadStatusChange};
    use crate::testkit::domain::{at, inbound_call};

    #[test]
    fn test_describe_inbound_call_names_caller() {
        let line = describe(&StudioEvent::NewInboundCall(inbound_call("call-9")));
        assert!(line.contains("Jan Kowalski"));
        assert!(line.contains("call-9"));
    }

    #[test]
    fn test_describe_status_change_shows_transition() {
        let change = LeadStatusChange {
            lead_id: LeadId::new("42"),
            status: LeadStatus::Won,
            previous_status: Some(LeadStatus::Quoted),
            updated_at: at(11),
        };
        assert_eq!(
            describe(&StudioEvent::LeadStatusChanged(change)),
            "lead 42: QUOTED → WON"
        );
    }
}
