//! Push envelope decoding and dispatch.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::merge::{self, MergeReport};
use crate::application::cache::QueryCache;
use crate::domain::{DecodeError, StudioEvent};

/// Result of handling one push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Known event, merged into the cache.
    Applied {
        kind: &'static str,
        report: MergeReport,
    },
    /// Well-formed envelope with a type tag this client does not handle.
    Ignored { kind: String },
    /// Not a valid envelope, or the payload did not match its type.
    Malformed,
}

/// Routes decoded events to their merge handler.
///
/// Never fails: anything it cannot use is logged and dropped so the stream
/// keeps flowing.
pub struct EventDispatcher {
    cache: Arc<QueryCache>,
    events: broadcast::Sender<StudioEvent>,
}

impl EventDispatcher {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self::with_capacity(cache, 256)
    }

    pub fn with_capacity(cache: Arc<QueryCache>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { cache, events }
    }

    /// Every event applied from now on, after it was merged.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub fn dispatch(&self, body: &str) -> DispatchOutcome {
        match StudioEvent::decode(body) {
            Ok((envelope, event)) => {
                let kind = event.kind();
                let report = merge::apply(&self.cache, &event);
                debug!(
                    kind,
                    timestamp = %envelope.timestamp,
                    patched = report.patched,
                    removed = report.removed,
                    invalidated = report.invalidated,
                    "Merged push event"
                );
                let _ = self.events.send(event);
                DispatchOutcome::Applied { kind, report }
            }
            Err(DecodeError::UnknownType(kind)) => {
                warn!(kind = %kind, "Ignoring push event of unknown type");
                DispatchOutcome::Ignored { kind }
            }
            Err(e) => {
                warn!(error = %e, "Dropping malformed push event");
                DispatchOutcome::Malformed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeadFilter, QueryKey};
    use crate::testkit::domain::{envelope, inbound_call_payload, lead, lead_page};

    fn dispatcher() -> (EventDispatcher, Arc<QueryCache>) {
        let cache = Arc::new(QueryCache::default());
        cache.write(
            QueryKey::lead_list(&LeadFilter::default()),
            lead_page(vec![lead("1")]),
        );
        (EventDispatcher::new(Arc::clone(&cache)), cache)
    }

    #[test]
    fn test_every_known_type_is_handled() {
        let (dispatcher, _) = dispatcher();
        for kind in StudioEvent::KNOWN_TYPES {
            let outcome = dispatcher.dispatch(&envelope(kind, serde_json::json!({})));
            // Empty payloads are malformed for entity events, but never unknown.
            assert!(
                !matches!(outcome, DispatchOutcome::Ignored { .. }),
                "{kind} was treated as unknown"
            );
        }
    }

    #[test]
    fn test_unknown_type_ignored() {
        let (dispatcher, cache) = dispatcher();
        let before = cache.read(&QueryKey::lead_list(&LeadFilter::default()));
        let outcome = dispatcher.dispatch(&envelope("VEHICLE_ARRIVED", serde_json::json!({})));
        assert_eq!(
            outcome,
            DispatchOutcome::Ignored {
                kind: "VEHICLE_ARRIVED".into()
            }
        );
        assert_eq!(cache.read(&QueryKey::lead_list(&LeadFilter::default())), before);
    }

    #[test]
    fn test_malformed_bodies_dropped() {
        let (dispatcher, _) = dispatcher();
        assert_eq!(dispatcher.dispatch("not json"), DispatchOutcome::Malformed);
        assert_eq!(dispatcher.dispatch("{}"), DispatchOutcome::Malformed);
        assert_eq!(
            dispatcher.dispatch(&envelope(
                "LEAD_STATUS_CHANGED",
                serde_json::json!({"leadId": "1", "status": "SHIPPED"})
            )),
            DispatchOutcome::Malformed
        );
    }

    #[test]
    fn test_applied_events_are_broadcast() {
        let (dispatcher, _) = dispatcher();
        let mut rx = dispatcher.subscribe();
        let outcome = dispatcher.dispatch(&envelope("NEW_INBOUND_CALL", inbound_call_payload("call-9")));
        assert!(matches!(
            outcome,
            DispatchOutcome::Applied { kind: "NEW_INBOUND_CALL", .. }
        ));
        assert!(matches!(rx.try_recv().unwrap(), StudioEvent::NewInboundCall(_)));
    }
}
