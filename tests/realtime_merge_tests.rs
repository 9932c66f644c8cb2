//! Push events merged into the cache, directly and through the hub.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use studiosync::application::cache::QueryCache;
use studiosync::application::realtime::{
    ConnectionState, DispatchOutcome, EventDispatcher, PushConnection, RealtimeHub, Session,
};
use studiosync::domain::{
    LeadFilter, LeadId, LeadStatus, QueryKey, QueryValue, StudioEvent, StudioId,
};
use studiosync::testkit;
use studiosync::testkit::domain::{envelope, inbound_call_payload, lead, lead_page, summary};
use studiosync::testkit::transport::channel_transport;
use support::cache::Harness;

fn list_key() -> QueryKey {
    QueryKey::lead_list(&LeadFilter::default())
}

fn seeded_cache() -> Arc<QueryCache> {
    let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
    cache.write(list_key(), lead_page(vec![lead("1"), lead("42")]));
    cache.write(QueryKey::lead(&LeadId::new("42")), QueryValue::Lead(lead("42")));
    cache.write(
        QueryKey::pipeline_summary(),
        QueryValue::PipelineSummary(summary()),
    );
    cache
}

fn count_of(cache: &QueryCache, id: &str) -> usize {
    let value = cache.read(&list_key()).unwrap();
    value
        .as_lead_page()
        .unwrap()
        .data
        .iter()
        .filter(|l| l.id.as_str() == id)
        .count()
}

#[test]
fn inbound_call_delivered_twice_appears_once() {
    let cache = seeded_cache();
    let dispatcher = EventDispatcher::new(cache.clone());
    let body = envelope("NEW_INBOUND_CALL", inbound_call_payload("call-9"));

    let first = dispatcher.dispatch(&body);
    let second = dispatcher.dispatch(&body);

    assert!(matches!(first, DispatchOutcome::Applied { report, .. } if report.patched == 1));
    assert!(matches!(second, DispatchOutcome::Applied { report, .. } if report.patched == 0));
    assert_eq!(count_of(&cache, "call-9"), 1);

    let binding = cache.read(&list_key()).unwrap();
    let head = &binding.as_lead_page().unwrap().data[0];
    assert_eq!(head.id.as_str(), "call-9");
    assert!(head.requires_verification);
}

#[test]
fn unknown_and_malformed_events_leave_cache_untouched() {
    let cache = seeded_cache();
    let dispatcher = EventDispatcher::new(cache.clone());
    let version = cache.version_of(&list_key());

    assert_eq!(
        dispatcher.dispatch(&envelope("INVOICE_PAID", json!({ "id": "inv-1" }))),
        DispatchOutcome::Ignored {
            kind: "INVOICE_PAID".into()
        }
    );
    assert_eq!(dispatcher.dispatch("not json"), DispatchOutcome::Malformed);
    assert_eq!(
        dispatcher.dispatch(&envelope("LEAD_UPDATED", json!({ "id": 42 }))),
        DispatchOutcome::Malformed
    );

    assert_eq!(cache.version_of(&list_key()), version);
    assert!(!cache.is_stale(&QueryKey::pipeline_summary()));
}

#[test]
fn every_known_type_dispatches_without_panicking() {
    let cache = seeded_cache();
    let dispatcher = EventDispatcher::new(cache.clone());
    let updated = serde_json::to_value(lead("42")).unwrap();
    let payloads = [
        ("NEW_INBOUND_CALL", inbound_call_payload("call-1")),
        ("LEAD_CREATED", serde_json::to_value(lead("77")).unwrap()),
        ("LEAD_UPDATED", updated),
        (
            "LEAD_STATUS_CHANGED",
            json!({ "leadId": "42", "status": "WON", "updatedAt": "2026-03-01T11:00:00Z" }),
        ),
        ("LEAD_DELETED", json!({ "leadId": "1" })),
        (
            "CUSTOMER_UPDATED",
            serde_json::to_value(testkit::domain::customer("5")).unwrap(),
        ),
        ("PIPELINE_UPDATED", json!({})),
    ];
    assert_eq!(payloads.len(), StudioEvent::KNOWN_TYPES.len());

    for (kind, payload) in payloads {
        let outcome = dispatcher.dispatch(&envelope(kind, payload));
        assert!(
            matches!(outcome, DispatchOutcome::Applied { kind: k, .. } if k == kind),
            "{kind} was not applied: {outcome:?}"
        );
    }
}

#[test]
fn status_change_updates_list_and_detail_and_marks_summary_stale() {
    let cache = seeded_cache();
    let dispatcher = EventDispatcher::new(cache.clone());

    dispatcher.dispatch(&envelope(
        "LEAD_STATUS_CHANGED",
        json!({
            "leadId": "42",
            "status": "IN_PROGRESS",
            "previousStatus": "PENDING",
            "updatedAt": "2026-03-01T11:00:00Z",
        }),
    ));

    let list = cache.read(&list_key()).unwrap();
    let in_list = list.lead(&LeadId::new("42")).unwrap();
    assert_eq!(in_list.status, LeadStatus::InProgress);
    assert!(!in_list.requires_verification);

    let detail = cache.read(&QueryKey::lead(&LeadId::new("42"))).unwrap();
    assert_eq!(detail.lead(&LeadId::new("42")).unwrap().status, LeadStatus::InProgress);
    assert!(cache.is_stale(&QueryKey::pipeline_summary()));
}

#[test]
fn update_older_than_cache_is_rejected() {
    let cache = seeded_cache();
    let dispatcher = EventDispatcher::new(cache.clone());
    let mut stale = lead("42");
    stale.customer_name = "Outdated".into();
    stale.updated_at = testkit::domain::at(9);

    dispatcher.dispatch(&envelope(
        "LEAD_UPDATED",
        serde_json::to_value(&stale).unwrap(),
    ));

    let list = cache.read(&list_key()).unwrap();
    assert_eq!(list.lead(&LeadId::new("42")).unwrap().customer_name, "Customer 42");
}

#[tokio::test]
async fn push_merge_survives_rollback_of_unrelated_mutation() {
    let harness = Harness::with_leads(vec![lead("1"), lead("42")]);
    harness.client.leads(&LeadFilter::default()).await.unwrap();
    harness.api.set_latency(Duration::from_millis(50));
    harness.api.fail_next("update_lead_status", 500);
    let dispatcher = EventDispatcher::new(harness.cache().clone());

    let mutation = harness
        .mutations
        .change_lead_status(LeadId::new("1"), LeadStatus::Lost);
    let push = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.dispatch(&envelope("NEW_INBOUND_CALL", inbound_call_payload("call-9")));
    };
    let (result, ()) = tokio::join!(mutation, push);

    assert!(result.is_err());
    let cache = harness.cache();
    // Rollback found a newer version: the pushed lead stays, lead 1 is reverted.
    assert_eq!(count_of(cache, "call-9"), 1);
    assert!(cache.is_stale(&list_key()));
    let cached = cache.read(&list_key()).unwrap();
    assert_eq!(cached.lead(&LeadId::new("1")).unwrap().status, LeadStatus::Pending);

    let served = harness.client.leads(&LeadFilter::default()).await.unwrap();
    let lead_1 = served.data.iter().find(|l| l.id == LeadId::new("1")).unwrap();
    assert_eq!(lead_1.status, LeadStatus::Pending);
    assert_eq!(harness.api.lead(&LeadId::new("1")).unwrap().status, LeadStatus::Pending);
}

#[tokio::test]
async fn hub_opens_on_first_subscriber_and_closes_after_last() {
    let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
    cache.write(list_key(), lead_page(vec![lead("1")]));
    let (transport, handle) = channel_transport(16);
    let connection = PushConnection::new(transport, testkit::config::reconnection());
    let dispatcher = EventDispatcher::new(cache.clone());
    let mut events = dispatcher.subscribe();
    let (hub, task) = RealtimeHub::spawn(connection, dispatcher);

    let session = Session::authenticated(StudioId::new("17"), "token");
    let topic = session.dashboard_topic().unwrap();
    let first = hub.subscribe(&session).await.unwrap();
    let second = hub.subscribe(&session).await.unwrap();
    assert_eq!(handle.connect_count(), 1);
    assert_eq!(handle.topics(), vec![topic.clone()]);
    assert_eq!(hub.state(), ConnectionState::Connected);

    handle
        .publish(&topic, envelope("NEW_INBOUND_CALL", inbound_call_payload("call-9")))
        .await;
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind(), "NEW_INBOUND_CALL");
    assert_eq!(count_of(&cache, "call-9"), 1);

    hub.unsubscribe(first).await.unwrap();
    assert_eq!(handle.topics(), vec![topic]);
    assert_eq!(handle.disconnect_count(), 0);

    hub.unsubscribe(second).await.unwrap();
    assert!(handle.topics().is_empty());
    assert_eq!(handle.disconnect_count(), 1);
    assert_eq!(hub.state(), ConnectionState::Disconnected);

    hub.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn hub_rejects_unauthenticated_session() {
    let (transport, handle) = channel_transport(4);
    let connection = PushConnection::new(transport, testkit::config::reconnection());
    let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
    let (hub, _task) = RealtimeHub::spawn(connection, EventDispatcher::new(cache));

    let result = hub.subscribe(&Session::default()).await;
    assert!(matches!(
        result,
        Err(studiosync::error::Error::Unauthenticated(_))
    ));
    assert_eq!(handle.connect_count(), 0);
}
