//! Optimistic mutations against an in-memory backend.

mod support;

use std::time::Duration;

use rust_decimal_macros::dec;
use studiosync::domain::{
    CustomerFilter, CustomerId, CustomerPatch, CustomerStatus, KeyFilter, LeadFilter, LeadId,
    LeadPatch, LeadSource, LeadStatus, NewCustomer, NewLead, QueryKey,
};
use studiosync::error::{Error, MutationError};
use studiosync::testkit::domain::{customer, lead};
use support::cache::Harness;

fn list_key() -> QueryKey {
    QueryKey::lead_list(&LeadFilter::default())
}

fn customer_list_key() -> QueryKey {
    QueryKey::customer_list(&CustomerFilter::default())
}

async fn seeded(ids: &[&str]) -> Harness {
    let harness = Harness::with_leads(ids.iter().map(|id| lead(id)).collect());
    harness.client.leads(&LeadFilter::default()).await.unwrap();
    for id in ids {
        harness.client.lead(&LeadId::new(*id)).await.unwrap();
    }
    harness
}

#[tokio::test]
async fn failed_status_change_restores_every_entry_byte_for_byte() {
    let harness = seeded(&["42", "43"]).await;
    let detail_key = QueryKey::lead(&LeadId::new("42"));
    let list_before = harness.serialized(&list_key());
    let detail_before = harness.serialized(&detail_key);

    harness.api.fail_next("update_lead_status", 500);
    let err = harness
        .mutations
        .change_lead_status(LeadId::new("42"), LeadStatus::InProgress)
        .await
        .unwrap_err();

    match &err {
        MutationError::Rejected { restored, .. } => assert_eq!(*restored, 2),
        other => panic!("expected rejection, got {other}"),
    }
    assert!(matches!(err.cause(), Some(Error::Api { status: 500, .. })));

    assert_eq!(harness.serialized(&list_key()), list_before);
    assert_eq!(harness.serialized(&detail_key), detail_before);

    let cached = harness.client.lead(&LeadId::new("42")).await.unwrap();
    assert_eq!(cached.status, LeadStatus::Pending);
    assert!(cached.requires_verification);
}

#[tokio::test]
async fn status_change_is_visible_before_the_backend_answers() {
    let harness = seeded(&["42"]).await;
    harness.api.set_latency(Duration::from_millis(100));
    let mut updates = harness.cache().subscribe();

    let mutations = &harness.mutations;
    let pending = mutations.change_lead_status(LeadId::new("42"), LeadStatus::InProgress);
    let observe = async {
        // First notification is the optimistic patch.
        updates.recv().await.unwrap();
        harness.cache().read(&list_key()).unwrap()
    };
    let (result, during) = tokio::join!(pending, observe);

    result.unwrap();
    let lead = during.lead(&LeadId::new("42")).unwrap();
    assert_eq!(lead.status, LeadStatus::InProgress);
    assert!(!lead.requires_verification);
}

#[tokio::test]
async fn second_mutation_on_same_lead_waits_and_keeps_first_result() {
    let harness = seeded(&["7"]).await;
    harness.api.set_latency(Duration::from_millis(50));
    harness.api.fail_next("update_lead", 500);

    let status = harness
        .mutations
        .change_lead_status(LeadId::new("7"), LeadStatus::Quoted);
    let value = harness
        .mutations
        .update_lead(LeadId::new("7"), LeadPatch::value(dec!(9000)));
    let (status, value) = tokio::join!(status, value);

    assert_eq!(status.unwrap().status, LeadStatus::Quoted);
    assert!(matches!(value, Err(MutationError::Rejected { .. })));
    assert_eq!(harness.api.writes(), vec!["update_lead_status:7".to_string()]);
    assert_eq!(harness.mutations.entities_locked(), 0);

    let cached = harness.cache().read(&list_key()).unwrap();
    let lead = cached.lead(&LeadId::new("7")).unwrap();
    assert_eq!(lead.status, LeadStatus::Quoted);
    assert_eq!(lead.estimated_value, dec!(1500.00));
}

#[tokio::test]
async fn confirmed_mutation_converges_with_server_after_refetch() {
    let harness = seeded(&["42"]).await;

    harness
        .mutations
        .change_lead_status(LeadId::new("42"), LeadStatus::InProgress)
        .await
        .unwrap();
    assert!(harness.cache().is_stale(&list_key()));

    harness.client.refresh(&KeyFilter::All).await;
    let cached = harness.cache().read(&list_key()).unwrap();
    let server = harness.api.lead(&LeadId::new("42")).unwrap();
    assert_eq!(
        serde_json::to_value(cached.lead(&LeadId::new("42")).unwrap()).unwrap(),
        serde_json::to_value(&server).unwrap()
    );
    assert!(!harness.cache().is_stale(&list_key()));
}

#[tokio::test]
async fn invalid_input_never_touches_the_cache() {
    let harness = seeded(&["1"]).await;
    let version = harness.cache().version_of(&list_key());

    let err = harness
        .mutations
        .update_lead(LeadId::new("1"), LeadPatch::value(dec!(-10)))
        .await
        .unwrap_err();

    assert!(matches!(err, MutationError::Invalid(_)));
    assert_eq!(harness.cache().version_of(&list_key()), version);
    assert_eq!(harness.api.calls("update_lead"), 0);
}

#[tokio::test]
async fn created_lead_replaces_its_placeholder() {
    let harness = seeded(&["1"]).await;

    let created = harness
        .mutations
        .create_lead(NewLead {
            customer_name: "Ewa Nowak".into(),
            phone: None,
            email: Some("ewa@example.com".into()),
            source: LeadSource::Referral,
            estimated_value: dec!(650),
            notes: None,
        })
        .await
        .unwrap();

    let cached = harness.cache().read(&list_key()).unwrap();
    let page = cached.as_lead_page().unwrap();
    assert_eq!(page.data[0].id, created.id);
    assert!(page.data.iter().all(|l| !l.id.is_temporary()));
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn failed_create_removes_placeholder() {
    let harness = seeded(&["1"]).await;
    let before = harness.serialized(&list_key());
    harness.api.fail_next("create_lead", 503);

    let result = harness
        .mutations
        .create_lead(NewLead {
            customer_name: "Ewa Nowak".into(),
            phone: None,
            email: None,
            source: LeadSource::Manual,
            estimated_value: dec!(100),
            notes: None,
        })
        .await;

    assert!(result.is_err());
    assert_eq!(harness.serialized(&list_key()), before);
}

#[tokio::test]
async fn deleted_lead_leaves_lists_and_detail() {
    let harness = seeded(&["1", "2"]).await;

    harness.mutations.delete_lead(LeadId::new("1")).await.unwrap();

    let cached = harness.cache().read(&list_key()).unwrap();
    assert!(cached.lead(&LeadId::new("1")).is_none());
    assert!(harness
        .cache()
        .read(&QueryKey::lead(&LeadId::new("1")))
        .is_none());
}

#[tokio::test]
async fn cancelled_mutation_rolls_back_and_marks_stale() {
    let harness = seeded(&["1"]).await;
    harness.api.set_latency(Duration::from_millis(200));

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        harness
            .mutations
            .change_lead_status(LeadId::new("1"), LeadStatus::Won),
    )
    .await;
    assert!(result.is_err());
    tokio::time::sleep(Duration::from_millis(300)).await;

    let cached = harness.cache().read(&list_key()).unwrap();
    assert_eq!(cached.lead(&LeadId::new("1")).unwrap().status, LeadStatus::Pending);
    assert!(harness.cache().is_stale(&list_key()));
    assert!(harness.api.writes().is_empty());
    assert_eq!(harness.mutations.entities_locked(), 0);
}

async fn seeded_customers(ids: &[&str]) -> Harness {
    let harness = Harness::with_customers(ids.iter().map(|id| customer(id)).collect());
    harness
        .client
        .customers(&CustomerFilter::default())
        .await
        .unwrap();
    for id in ids {
        harness
            .client
            .fetch(&QueryKey::customer(&CustomerId::new(*id)))
            .await
            .unwrap();
    }
    harness
}

fn studio_client_draft() -> NewCustomer {
    NewCustomer {
        name: "Auto Detailing Sp. z o.o.".into(),
        email: Some("biuro@example.com".into()),
        phone: None,
        nip: Some("526-000-12-46".into()),
        regon: None,
    }
}

#[tokio::test]
async fn failed_customer_update_restores_every_entry_byte_for_byte() {
    let harness = seeded_customers(&["5", "6"]).await;
    let detail_key = QueryKey::customer(&CustomerId::new("5"));
    let list_before = harness.serialized(&customer_list_key());
    let detail_before = harness.serialized(&detail_key);

    harness.api.fail_next("update_customer", 500);
    let err = harness
        .mutations
        .update_customer(
            CustomerId::new("5"),
            CustomerPatch {
                status: Some(CustomerStatus::Inactive),
                ..CustomerPatch::default()
            },
        )
        .await
        .unwrap_err();

    match &err {
        MutationError::Rejected { restored, .. } => assert_eq!(*restored, 2),
        other => panic!("expected rejection, got {other}"),
    }
    assert!(matches!(err.cause(), Some(Error::Api { status: 500, .. })));
    assert_eq!(harness.serialized(&customer_list_key()), list_before);
    assert_eq!(harness.serialized(&detail_key), detail_before);
}

#[tokio::test]
async fn created_customer_replaces_its_placeholder() {
    let harness = seeded_customers(&["5"]).await;

    let created = harness
        .mutations
        .create_customer(studio_client_draft())
        .await
        .unwrap();

    assert_eq!(created.nip.as_deref(), Some("5260001246"));
    let cached = harness.cache().read(&customer_list_key()).unwrap();
    let page = cached.as_customer_page().unwrap();
    assert_eq!(page.data[0].id, created.id);
    assert!(page.data.iter().all(|c| !c.id.is_temporary()));
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn failed_customer_create_removes_placeholder() {
    let harness = seeded_customers(&["5"]).await;
    let before = harness.serialized(&customer_list_key());
    harness.api.fail_next("create_customer", 503);

    let result = harness
        .mutations
        .create_customer(studio_client_draft())
        .await;

    assert!(matches!(result, Err(MutationError::Rejected { .. })));
    assert_eq!(harness.serialized(&customer_list_key()), before);
    assert!(harness.api.writes().is_empty());
}

#[tokio::test]
async fn deleted_customer_leaves_lists_and_detail() {
    let harness = seeded_customers(&["5", "6"]).await;
    let detail_key = QueryKey::customer(&CustomerId::new("5"));
    assert!(harness.cache().read(&detail_key).is_some());

    harness
        .mutations
        .delete_customer(CustomerId::new("5"))
        .await
        .unwrap();

    let cached = harness.cache().read(&customer_list_key()).unwrap();
    assert!(cached.customer(&CustomerId::new("5")).is_none());
    assert!(cached.customer(&CustomerId::new("6")).is_some());
    assert!(harness.cache().read(&detail_key).is_none());
    assert_eq!(harness.api.writes(), vec!["delete_customer:5".to_string()]);
}
