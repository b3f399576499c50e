//! End-to-end propagation tests against injected backends: in-memory
//! primary store, recording search index.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};

use fresnel_api::record::Record;
use fresnel_api::store::DocumentStore;
use fresnel_engine::bootstrap::Engine;
use fresnel_engine::config::FresnelConfig;
use fresnel_index::{RecordedKind, RecordingIndex};
use fresnel_store::MemoryStore;

fn test_config() -> FresnelConfig {
    FresnelConfig::parse(
        r#"
        [propagation]
        buffer = 64
        max_attempts = 4
        retry_base_ms = 5

        [[mirrors]]
        collection = "blogs"
        "#,
    )
    .unwrap()
}

fn engine_with_recording(config: &FresnelConfig) -> (Engine, Arc<MemoryStore>, Arc<RecordingIndex>) {
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(RecordingIndex::new());
    let engine = Engine::with_backends(config, store.clone(), index.clone());
    (engine, store, index)
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().expect("object").clone()
}

fn body_of(record: &Record) -> Vec<u8> {
    serde_json::to_vec(&record.to_value()).unwrap()
}

/// Propagation is eventually consistent; poll until the recorder has seen
/// `n` operations or the deadline passes.
async fn wait_for_ops(index: &RecordingIndex, n: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while index.ops().len() < n {
        if tokio::time::Instant::now() > deadline {
            panic!("expected {n} index operations, saw {:?}", index.ops());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn create_is_mirrored_with_the_assigned_id() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    let record = store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
    assert_eq!(record.id, "1");
    engine.interceptor().observe_create("blogs", &body_of(&record));

    wait_for_ops(&index, 1).await;
    let ops = index.ops();
    assert_eq!(ops[0].kind, RecordedKind::Index);
    assert_eq!(ops[0].index, "blogs");
    assert_eq!(ops[0].id, "1");
    assert_eq!(ops[0].doc, Some(fields(json!({"id": "1", "title": "A"}))));

    engine.shutdown().await;
}

#[tokio::test]
async fn update_carries_the_full_new_field_set() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    let created = store
        .create("blogs", fields(json!({"title": "A", "author": "x"})))
        .await
        .unwrap();
    engine.interceptor().observe_create("blogs", &body_of(&created));

    let updated = store
        .replace("blogs", "1", fields(json!({"title": "B"})))
        .await
        .unwrap();
    engine.interceptor().observe_update("blogs", &body_of(&updated));

    wait_for_ops(&index, 2).await;
    let ops = index.ops();
    assert_eq!(ops[1].kind, RecordedKind::Update);
    // full replace: the stale "author" field is gone from the payload
    assert_eq!(ops[1].doc, Some(fields(json!({"id": "1", "title": "B"}))));

    engine.shutdown().await;
}

#[tokio::test]
async fn delete_is_idempotent_at_the_index() {
    let config = test_config();
    let (engine, _store, index) = engine_with_recording(&config);

    // Second delete targets an id the index has never seen — still a
    // no-op success, never a hard failure.
    engine.interceptor().observe_delete("blogs", "1");
    engine.interceptor().observe_delete("blogs", "1");

    wait_for_ops(&index, 2).await;
    let ops = index.ops();
    assert!(ops.iter().all(|op| op.kind == RecordedKind::Delete && op.id == "1"));

    engine.shutdown().await;
}

#[tokio::test]
async fn same_id_operations_apply_in_submission_order() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    let record = store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
    engine.interceptor().observe_create("blogs", &body_of(&record));
    engine.interceptor().observe_update("blogs", &body_of(&record));
    engine.interceptor().observe_delete("blogs", &record.id);

    wait_for_ops(&index, 3).await;
    let kinds: Vec<_> = index.ops().iter().map(|op| op.kind).collect();
    assert_eq!(
        kinds,
        vec![RecordedKind::Index, RecordedKind::Update, RecordedKind::Delete]
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn malformed_response_body_skips_propagation() {
    let config = test_config();
    let (engine, _store, index) = engine_with_recording(&config);

    engine.interceptor().observe_create("blogs", b"definitely not json");
    engine.interceptor().observe_update("blogs", br#"{"title":"no id here"}"#);

    // Give the worker a moment; nothing must arrive.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(index.ops().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn unmirrored_collections_are_never_propagated() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    let record = store.create("authors", fields(json!({"name": "x"}))).await.unwrap();
    engine.interceptor().observe_create("authors", &body_of(&record));
    engine.interceptor().observe_delete("authors", &record.id);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(index.ops().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn transient_index_failure_is_retried() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    index.fail_times(2);
    let record = store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
    engine.interceptor().observe_create("blogs", &body_of(&record));

    // max_attempts = 4, so attempt 3 lands.
    wait_for_ops(&index, 1).await;
    assert_eq!(index.ops()[0].id, "1");

    engine.shutdown().await;
}

#[tokio::test]
async fn exhausted_retries_dead_letter_without_killing_the_worker() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    index.fail_always();
    let doomed = store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
    engine.interceptor().observe_create("blogs", &body_of(&doomed));

    // All 4 attempts burn through (5 + 10 + 20 ms of backoff).
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(index.ops().is_empty());

    // The worker survives the dead-lettered job and applies later ones.
    index.fail_times(0);
    let next = store.create("blogs", fields(json!({"title": "B"}))).await.unwrap();
    engine.interceptor().observe_create("blogs", &body_of(&next));

    wait_for_ops(&index, 1).await;
    assert_eq!(index.ops()[0].id, "2");

    engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_queued_operations() {
    let config = test_config();
    let (engine, store, index) = engine_with_recording(&config);

    for title in ["A", "B", "C"] {
        let record = store.create("blogs", fields(json!({"title": title}))).await.unwrap();
        engine.interceptor().observe_create("blogs", &body_of(&record));
    }

    engine.shutdown().await;
    assert_eq!(index.ops().len(), 3);
}
