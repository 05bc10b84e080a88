//! Trait contract tests for MirrorStore.
//!
//! Every conforming implementation must pass these. They run against the
//! in-memory fake and the SurrealDB backend (`mem://`).

use std::sync::{Arc, Mutex};

use judging_state::fakes::MemoryMirrorStore;
use judging_state::{MirrorStore, StorageError, StorePath, SurrealMirrorStore};
use serde_json::{json, Value};

fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

async fn check_get_absent_is_none(store: &dyn MirrorStore) {
    assert_eq!(store.get(&path("contests/missing")).await.unwrap(), None);
    assert_eq!(store.get(&path("contests/missing/entries/e1")).await.unwrap(), None);
}

async fn check_set_then_get_nested(store: &dyn MirrorStore) {
    let contest = json!({
        "id": "c1",
        "name": "Contest: Comic Strip",
        "entries": {"e1": {"id": "e1"}, "e2": {"id": "e2"}}
    });
    store.set(&path("contests/c1"), Some(contest.clone())).await.unwrap();

    assert_eq!(store.get(&path("contests/c1")).await.unwrap(), Some(contest));
    assert_eq!(
        store.get(&path("contests/c1/entries/e2/id")).await.unwrap(),
        Some(json!("e2"))
    );
}

async fn check_list_is_key_ordered(store: &dyn MirrorStore) {
    for key in ["b", "c", "a"] {
        store
            .set(&path(&format!("rubrics/{key}")), Some(json!({"max": 5})))
            .await
            .unwrap();
    }
    let keys: Vec<String> = store.list(&path("rubrics")).await.unwrap().into_keys().collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert!(store.list(&path("nothing/here")).await.unwrap().is_empty());
}

async fn check_delete(store: &dyn MirrorStore) {
    store
        .set(&path("contests/c2"), Some(json!({"entries": {"e1": {"id": "e1"}}})))
        .await
        .unwrap();
    store.set(&path("contests/c2/entries/e1"), None).await.unwrap();
    assert_eq!(store.get(&path("contests/c2/entries/e1")).await.unwrap(), None);

    store.set(&path("contests/c2"), None).await.unwrap();
    assert_eq!(store.get(&path("contests/c2")).await.unwrap(), None);

    // Deleting again is a no-op
    store.set(&path("contests/c2"), None).await.unwrap();
    store.set(&path("contests/c2/entries/e9"), None).await.unwrap();
}

async fn check_deep_write_creates_parents(store: &dyn MirrorStore) {
    store
        .set(&path("contests/c3/entries/e1/scores/rubric"), Some(json!({"NumberOfJudges": 0})))
        .await
        .unwrap();
    assert_eq!(
        store.get(&path("contests/c3/entries/e1/scores/rubric/NumberOfJudges")).await.unwrap(),
        Some(json!(0))
    );
}

async fn check_push_generates_unique_keys(store: &dyn MirrorStore) {
    let a = store.push(&path("allowedJudges"), json!({"uid": "u1"})).await.unwrap();
    let b = store.push(&path("allowedJudges"), json!({"uid": "u2"})).await.unwrap();
    assert_ne!(a, b);
    let judges = store.list(&path("allowedJudges")).await.unwrap();
    assert_eq!(judges.get(&a), Some(&json!({"uid": "u1"})));
    assert_eq!(judges.get(&b), Some(&json!({"uid": "u2"})));
}

async fn check_subscribe_added(store: &dyn MirrorStore) {
    store.set(&path("loggedInJudges/u1"), Some(json!({"uid": "u1"}))).await.unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = store
        .subscribe_added(
            &path("loggedInJudges"),
            Arc::new(move |key: &str, _value: &Value| sink.lock().unwrap().push(key.to_string())),
        )
        .await
        .unwrap();

    store.set(&path("loggedInJudges/u2"), Some(json!({"uid": "u2"}))).await.unwrap();
    // Updating an existing child is not an addition
    store.set(&path("loggedInJudges/u1"), Some(json!({"uid": "u1", "x": 1}))).await.unwrap();

    store.unsubscribe(id).await.unwrap();
    store.set(&path("loggedInJudges/u3"), Some(json!({"uid": "u3"}))).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["u1".to_string(), "u2".to_string()]);
}

async fn run_contract(store: &dyn MirrorStore) {
    check_get_absent_is_none(store).await;
    check_set_then_get_nested(store).await;
    check_list_is_key_ordered(store).await;
    check_delete(store).await;
    check_deep_write_creates_parents(store).await;
    check_push_generates_unique_keys(store).await;
    check_subscribe_added(store).await;
}

// ===========================================================================
// MemoryMirrorStore
// ===========================================================================

#[tokio::test]
async fn memory_store_satisfies_contract() {
    let store = MemoryMirrorStore::new();
    run_contract(&store).await;
}

#[tokio::test]
async fn memory_store_injects_write_failures() {
    let store = MemoryMirrorStore::new();
    store.fail_writes_under(path("contests/bad"));

    let err = store
        .set(&path("contests/bad/entries/e1"), Some(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Injected { .. }));

    store.set(&path("contests/good"), Some(json!({}))).await.unwrap();
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn memory_store_injects_read_failures() {
    let store = MemoryMirrorStore::new();
    store.fail_reads_under(path("contests"));
    assert!(store.list(&path("contests")).await.is_err());
    assert!(store.get(&path("rubrics")).await.unwrap().is_none());
}

#[tokio::test]
async fn memory_store_list_of_scalar_is_error() {
    let store = MemoryMirrorStore::with_tree(json!({"config": {"version": 3}}));
    let err = store.list(&path("config/version")).await.unwrap_err();
    assert!(matches!(err, StorageError::NotAnObject { .. }));
}

#[tokio::test]
async fn memory_store_null_write_is_delete() {
    let store = MemoryMirrorStore::new();
    store.set(&path("contests/c1"), Some(json!({"id": "c1"}))).await.unwrap();
    store.set(&path("contests/c1"), Some(Value::Null)).await.unwrap();
    assert_eq!(store.snapshot(), json!({"contests": {}}));
}

// ===========================================================================
// SurrealMirrorStore
// ===========================================================================

#[tokio::test]
async fn surreal_store_satisfies_contract() {
    let store = SurrealMirrorStore::setup_db().await.unwrap();
    run_contract(&store).await;
}

#[tokio::test]
async fn surreal_store_replaces_whole_collection() {
    let store = SurrealMirrorStore::setup_db().await.unwrap();
    store
        .set(&path("rubrics"), Some(json!({"Level": {"max": 5}, "Overall": {"max": 10}})))
        .await
        .unwrap();
    store
        .set(&path("rubrics"), Some(json!({"Creativity": {"max": 3}})))
        .await
        .unwrap();

    let keys: Vec<String> = store.list(&path("rubrics")).await.unwrap().into_keys().collect();
    assert_eq!(keys, vec!["Creativity"]);

    let err = store.set(&path("rubrics"), Some(json!(7))).await.unwrap_err();
    assert!(matches!(err, StorageError::NotAnObject { .. }));
}
