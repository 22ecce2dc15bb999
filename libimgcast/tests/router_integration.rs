//! Event handling tests
//!
//! Feed raw events through `handle_event` and check the `{statusCode, body}`
//! responses together with their effect on the store.

use anyhow::Result;
use libimgcast::caption::CaptionProcessor;
use libimgcast::platforms::mock::MockAdapter;
use libimgcast::platforms::AdapterSet;
use libimgcast::store::MemoryScheduleStore;
use libimgcast::types::Context;
use libimgcast::{handle_event, SchedulerEngine};
use serde_json::{json, Value};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

fn setup() -> (Arc<MemoryScheduleStore>, SchedulerEngine) {
    let store = Arc::new(MemoryScheduleStore::new());
    let adapters = AdapterSet::new()
        .with(Context::Mastodon, MockAdapter::success("mastodon"))
        .with(Context::Twitter, MockAdapter::publish_failure("twitter", "HTTP 500"));
    let engine = SchedulerEngine::new(store.clone(), adapters, CaptionProcessor::default());
    (store, engine)
}

fn enqueue(context: &str, posting_time: i64) -> Value {
    json!({
        "context": context,
        "postingHost": "https://mastodon.social",
        "postingToken": "1234567890",
        "caption": "This is a test caption",
        "imageURL": "http://image.host/image.jpg",
        "postingTime": posting_time
    })
}

#[tokio::test]
async fn test_enqueue_returns_id() -> Result<()> {
    let (store, engine) = setup();

    let response = handle_event(&engine, enqueue("mastodon", NOW + 60), NOW).await;

    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body)?;
    let id = body["id"].as_str().unwrap();
    assert!(store.contains(id));

    Ok(())
}

#[tokio::test]
async fn test_enqueue_then_sweep() -> Result<()> {
    let (store, engine) = setup();

    handle_event(&engine, enqueue("mastodon", NOW - 60), NOW).await;
    handle_event(&engine, enqueue("twitter", NOW - 60), NOW).await;
    handle_event(&engine, enqueue("mastodon", NOW + 60), NOW).await;

    let response = handle_event(&engine, json!({ "context": "schedule" }), NOW).await;

    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body)?;
    assert_eq!(body, json!({ "successfulCount": 1, "failedCount": 1 }));
    assert_eq!(store.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_envelope_body_is_unwrapped() -> Result<()> {
    let (store, engine) = setup();

    let event = json!({ "body": enqueue("instagram", NOW).to_string() });
    let response = handle_event(&engine, event, NOW).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(store.records()[0].context, "instagram");

    Ok(())
}

#[tokio::test]
async fn test_unknown_context_is_404() {
    let (store, engine) = setup();

    let response = handle_event(&engine, enqueue("myspace", NOW), NOW).await;

    assert_eq!(response.status_code, 404);
    assert_eq!(response.body, "unknown context");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_store_write_failure_is_501() {
    let (store, engine) = setup();
    store.fail_writes(true);

    let response = handle_event(&engine, enqueue("bluesky", NOW), NOW).await;

    assert_eq!(response.status_code, 501);
    assert_eq!(response.body, "failed to run scheduler");
}

#[tokio::test]
async fn test_sweep_query_failure_is_501() {
    let (store, engine) = setup();
    store.fail_queries_for(Context::Instagram);

    let response = handle_event(&engine, json!({ "context": "schedule" }), NOW).await;

    assert_eq!(response.status_code, 501);
}

#[tokio::test]
async fn test_missing_field_is_501() {
    let (store, engine) = setup();

    let mut event = enqueue("mastodon", NOW);
    event.as_object_mut().unwrap().remove("imageURL");
    let response = handle_event(&engine, event, NOW).await;

    assert_eq!(response.status_code, 501);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_non_string_context_is_404() {
    let (store, engine) = setup();

    let response = handle_event(&engine, json!({ "context": 5 }), NOW).await;

    assert_eq!(response.status_code, 404);
    assert_eq!(response.body, "unknown context");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_sweep_with_stray_fields_still_sweeps() -> Result<()> {
    let (store, engine) = setup();
    handle_event(&engine, enqueue("mastodon", NOW - 60), NOW).await;

    let event = json!({ "context": "schedule", "caption": 7, "postingTime": true });
    let response = handle_event(&engine, event, NOW).await;

    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body)?;
    assert_eq!(body["successfulCount"], 1);
    assert!(store.is_empty());

    Ok(())
}
