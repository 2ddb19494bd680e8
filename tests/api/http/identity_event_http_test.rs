//! Event hook tests: signature, payload validation, dedup and retry

use super::{build_test_router, post_event, TestAppState, WEBHOOK_SECRET};
use crate::api::{customer, emailpass_identity};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use storefront_core::api::identity_event::sign_body;

fn body(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn signed(bytes: &[u8]) -> String {
    sign_body(WEBHOOK_SECRET, bytes).unwrap()
}

fn identity_created(event_id: &str, identity_id: &str) -> Vec<u8> {
    body(json!({
        "id": event_id,
        "name": "auth.identity.created",
        "data": {
            "id": identity_id,
            "provider": "emailpass",
            "entity_id": "jane@example.com"
        }
    }))
}

async fn seeded_state() -> TestAppState {
    let state = TestAppState::new();
    state
        .identity_repo
        .add_identity(emailpass_identity("authid_jane", "jane@example.com"))
        .await;
    state
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let app = build_test_router(seeded_state().await);

    let (status, body) = post_event(&app, &identity_created("evt_1", "authid_jane"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap()["type"], "unauthorized");
}

#[tokio::test]
async fn test_invalid_signature_rejected() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");
    let wrong = sign_body("some-other-secret", &payload).unwrap();

    let (status, _) = post_event(&app, &payload, Some(&wrong)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.customer_repo.all().await.is_empty());
}

#[tokio::test]
async fn test_unsigned_events_accepted_without_secret() {
    let mut config = super::create_test_config();
    config.events.webhook_secret = None;
    let state = TestAppState::with_config(config);
    state
        .identity_repo
        .add_identity(emailpass_identity("authid_jane", "jane@example.com"))
        .await;
    let app = build_test_router(state.clone());

    let (status, _) = post_event(&app, &identity_created("evt_1", "authid_jane"), None).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.customer_repo.all().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_envelope_is_bad_request() {
    let app = build_test_router(seeded_state().await);
    let payload = b"not json".to_vec();

    let (status, body) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["type"], "invalid_data");
}

#[tokio::test]
async fn test_missing_provider_is_bad_request() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = body(json!({
        "id": "evt_1",
        "name": "auth.identity.created",
        "data": { "id": "authid_jane" }
    }));

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!state.cache.is_marked("evt_1").await);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = body(json!({
        "id": "evt_1",
        "name": "order.placed",
        "data": { "id": "order_1" }
    }));

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.customer_repo.all().await.is_empty());
}

#[tokio::test]
async fn test_identity_created_links_customer() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    let (status, body) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());

    let customers = state.customer_repo.all().await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].email, "jane@example.com");
    let identity = state.identity_repo.get("authid_jane").await.unwrap();
    assert_eq!(identity.customer_id(), Some(customers[0].id.as_str()));
    assert!(state.cache.is_marked("evt_1").await);
}

#[tokio::test]
async fn test_identity_created_reuses_existing_customer() {
    let state = seeded_state().await;
    state
        .customer_repo
        .add_customer(customer("cus_42", "jane@example.com"))
        .await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.customer_repo.all().await.len(), 1);
    let identity = state.identity_repo.get("authid_jane").await.unwrap();
    assert_eq!(identity.customer_id(), Some("cus_42"));
}

#[tokio::test]
async fn test_terminal_outcomes_are_acknowledged() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());

    let unknown = identity_created("evt_1", "authid_missing");
    let (status, _) = post_event(&app, &unknown, Some(&signed(&unknown))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let social = body(json!({
        "id": "evt_2",
        "name": "auth.identity.created",
        "data": { "id": "authid_jane", "provider": "google", "entity_id": "g-1" }
    }));
    let (status, _) = post_event(&app, &social, Some(&signed(&social))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(state.customer_repo.all().await.is_empty());
}

#[tokio::test]
async fn test_duplicate_delivery_is_skipped() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // A second processing attempt would now fail
    state.identity_repo.set_fail_lookups(true);
    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.customer_repo.all().await.len(), 1);
}

#[tokio::test]
async fn test_dedup_falls_back_to_payload_id() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = body(json!({
        "name": "auth.identity.created",
        "data": { "id": "authid_jane", "provider": "emailpass" }
    }));

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(
        state
            .cache
            .is_marked("auth.identity.created:authid_jane")
            .await
    );
}

#[tokio::test]
async fn test_failure_clears_mark_so_redelivery_succeeds() {
    let state = seeded_state().await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    state.customer_repo.set_fail_lookups(true);
    let (status, body) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.unwrap()["type"], "internal_error");
    assert!(!state.cache.is_marked("evt_1").await);
    assert_eq!(state.cache.cleared().await, vec!["evt_1".to_string()]);

    state.customer_repo.set_fail_lookups(false);
    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    let identity = state.identity_repo.get("authid_jane").await.unwrap();
    assert!(identity.customer_id().is_some());
}

#[tokio::test]
async fn test_lost_race_is_retried_and_linked_to_winner() {
    let state = seeded_state().await;
    state
        .customer_repo
        .race_next_create(customer("cus_winner", "jane@example.com"))
        .await;
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    let (status, body) = post_event(&app, &payload, Some(&signed(&payload))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.unwrap()["type"], "unavailable");
    assert!(!state.cache.is_marked("evt_1").await);

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(state.customer_repo.all().await.len(), 1);
    let identity = state.identity_repo.get("authid_jane").await.unwrap();
    assert_eq!(identity.customer_id(), Some("cus_winner"));
}

#[tokio::test]
async fn test_cache_outage_still_processes() {
    let state = seeded_state().await;
    state.cache.set_unavailable(true);
    let app = build_test_router(state.clone());
    let payload = identity_created("evt_1", "authid_jane");

    let (status, _) = post_event(&app, &payload, Some(&signed(&payload))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.customer_repo.all().await.len(), 1);
}
