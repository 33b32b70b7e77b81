//! Integration Tests for the Store
//!
//! These tests drive the public API only: reads, writes, tracking, hooks,
//! batches, computed values and effects working together.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{stream, FutureExt};
use parking_lot::Mutex;
use serde_json::{json, Value};

use pathstate_core::{
    AccessResult, GetOptions, GraphBackend, HookError, Invalidate, OwnerId, Queue,
    QueueScheduler, Store, StoreConfig, StoreError, WriteSource,
};

fn store_with(backend: GraphBackend) -> Store {
    Store::with_config(
        StoreConfig::default().with_backend(backend),
        Arc::new(QueueScheduler::new()),
    )
    .unwrap()
}

fn both_backends() -> [Store; 2] {
    [
        store_with(GraphBackend::PathIndex),
        store_with(GraphBackend::Signal),
    ]
}

fn counting_invalidate() -> (Arc<AtomicUsize>, Invalidate) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let invalidate = Invalidate::new(move || {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });
    (calls, invalidate)
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Test that a written value reads back, and that reads are copies.
#[test]
fn round_trip_returns_copies() {
    let store = Store::new();
    store.set("a.b", 5).unwrap();

    let mut read = store.get("a").unwrap();
    assert_eq!(read["b"], json!(5));
    read["b"] = json!(99);

    assert_eq!(store.get("a.b"), Some(json!(5)));
}

/// Test that writing an unchanged value does not notify again.
#[test]
fn no_op_write_notifies_once() {
    let store = Store::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let _sub = store
        .on_change("x", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    store.set("x", 1).unwrap();
    store.set("x", 1).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test that only writes to read paths invalidate, on both backends.
#[test]
fn dependency_precision() {
    for store in both_backends() {
        let owner = OwnerId::new();
        let (calls, invalidate) = counting_invalidate();

        store
            .track_access(owner, || {
                store.get("a");
                store.get("b");
                Ok::<_, Infallible>(invalidate)
            })
            .unwrap();

        store.set("a", 2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set("c", 2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

/// Test that nested and enclosing writes reach a tracked path, on both
/// backends.
#[test]
fn tracker_sees_ancestor_and_descendant_writes() {
    for store in both_backends() {
        let owner = OwnerId::new();
        let (calls, invalidate) = counting_invalidate();
        store
            .track_access(owner, || {
                store.get("user.profile");
                Ok::<_, Infallible>(invalidate)
            })
            .unwrap();

        store.set("user.profile.name", "Ada").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.set("user", json!({"profile": null})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.set("user.settings", true).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

/// Test that an ancestor hook receives the full updated object.
#[test]
fn ancestor_propagation() {
    let store = Store::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let _sub = store
        .on_change("user", move |event| seen_clone.lock().push(event.val.clone()))
        .unwrap();

    store.set("user.name", "Ada").unwrap();

    assert_eq!(*seen.lock(), vec![Some(json!({"name": "Ada"}))]);
}

/// Test that writes in a batch notify once with the final value.
#[test]
fn batch_coalescing() {
    let store = Store::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let _sub = store
        .on_change("n", move |event| seen_clone.lock().push(event.val.clone()))
        .unwrap();

    store
        .batch(|| {
            store.set("n", 1)?;
            store.set("n", 2)?;
            store.set("n", 3)?;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    assert_eq!(*seen.lock(), vec![Some(json!(3))]);
}

/// Test that a failed batch discards its notifications.
#[test]
fn failed_batch_does_not_notify() {
    let store = Store::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let _sub = store
        .on_change("n", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let result: Result<(), &str> = store.batch(|| {
        store.set("n", 1).unwrap();
        Err("abort")
    });

    assert_eq!(result, Err("abort"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!store.in_batch());
}

/// Test that a failed tracked run leaves no subscription behind, on both
/// backends.
#[test]
fn rollback_safety() {
    for store in both_backends() {
        let owner = OwnerId::new();
        let (calls, invalidate) = counting_invalidate();

        let result = store.track_access(owner, || {
            store.get("z");
            if store.peek("z").is_none() {
                return Err("render failed");
            }
            Ok(invalidate)
        });
        assert_eq!(result, Err("render failed"));

        store.set("z", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.tracked_path_count(), 0);
    }
}

/// Test that a failed run restores the previous dependencies and callback.
#[test]
fn rollback_restores_previous_run() {
    let store = Store::new();
    let owner = OwnerId::new();
    let (calls, invalidate) = counting_invalidate();

    store
        .track_access(owner, || {
            store.get("a");
            Ok::<_, Infallible>(invalidate)
        })
        .unwrap();

    let failed = store.track_access(owner, || {
        store.get("b");
        Err::<Invalidate, _>("boom")
    });
    assert!(failed.is_err());
    assert_eq!(store.tracked_paths(owner), vec!["a".to_string()]);

    store.set("b", 1).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    store.set("a", 1).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test that an access hook runs once until refreshed.
#[test]
fn access_hook_single_fire() {
    let store = Store::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let _sub = store
        .on_access("remote.list", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            AccessResult::Value(json!(["a", "b"]))
        })
        .unwrap();

    assert_eq!(store.get("remote.list"), Some(json!(["a", "b"])));
    store.get("remote.list");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    store.get_with("remote.list", &GetOptions::new().refresh());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that a sync access hook's write-back lands on a default store and
/// reaches the owner that read it.
#[test]
fn access_hook_write_back_reaches_tracked_reader() {
    let store = Store::new();
    let _sub = store
        .on_access("user", |_| AccessResult::Value(json!({"name": "Ada", "age": 36})))
        .unwrap();
    let owner = OwnerId::new();
    let (calls, invalidate) = counting_invalidate();

    store
        .track_access(owner, || {
            assert_eq!(store.get("user.name"), Some(json!("Ada")));
            Ok::<_, Infallible>(invalidate)
        })
        .unwrap();

    assert_eq!(store.peek("user.age"), Some(json!(36)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get("user.name"), Some(json!("Ada")));
}

/// Test that an async access hook reports loading, then commits.
#[tokio::test]
async fn pending_access_hook_loads_value() {
    let store = Store::new();
    let (tx, rx) = tokio::sync::oneshot::channel::<Value>();
    let rx = Arc::new(Mutex::new(Some(rx)));
    let _sub = store
        .on_access("profile", move |_| {
            let Some(rx) = rx.lock().take() else {
                return AccessResult::Skip;
            };
            AccessResult::pending(async move {
                rx.await.map_err(|_| HookError::from("sender dropped"))
            })
        })
        .unwrap();

    let sources = Arc::new(Mutex::new(Vec::new()));
    let sources_clone = sources.clone();
    let _changes = store
        .on_change("profile", move |event| {
            sources_clone.lock().push((event.src, event.loading))
        })
        .unwrap();

    let meta = store.get_meta("profile", &GetOptions::new());
    assert_eq!(meta.data, None);
    assert!(meta.loading);
    assert!(store.is_loading("profile.name"));

    tx.send(json!({"name": "Ada"})).unwrap();
    settle().await;

    let meta = store.get_meta("profile", &GetOptions::new());
    assert_eq!(meta.data, Some(json!({"name": "Ada"})));
    assert!(!meta.loading);
    assert!(meta.error.is_none());
    assert_eq!(*sources.lock(), vec![(WriteSource::Get, false)]);
}

/// Test that a rejected access hook surfaces only through meta.
#[tokio::test]
async fn failed_access_hook_reports_error() {
    let store = Store::new();
    let _sub = store
        .on_access("remote", |_| {
            AccessResult::pending(async { Err(HookError::from("503 from upstream")) })
        })
        .unwrap();

    assert_eq!(store.get("remote"), None);
    settle().await;

    let meta = store.get_meta("remote", &GetOptions::new());
    assert_eq!(meta.data, None);
    assert!(!meta.loading);
    assert_eq!(meta.error, Some(HookError::from("503 from upstream")));
}

/// Test that paged results are set, then merged.
#[tokio::test]
async fn paged_access_hook_merges_pages() {
    let store = Store::new();
    let _sub = store
        .on_access("feed", |_| {
            AccessResult::paged(stream::iter(vec![
                Ok(json!([1, 2])),
                Ok(json!([3])),
                Ok(json!([4, 5])),
            ]))
        })
        .unwrap();

    store.get("feed");
    settle().await;

    assert_eq!(store.get("feed"), Some(json!([1, 2, 3, 4, 5])));
    assert!(!store.get_meta("feed", &GetOptions::new()).loading);
}

/// Test that a diff query write-back lands in the store.
#[tokio::test]
async fn diff_query_writes_back_futures() {
    let store = Store::new();
    let _sub = store
        .on_change("todos", |event| {
            event.diff.query("todos.*", |_, val, _| {
                let title = val?.get("title")?.as_str()?.to_uppercase();
                Some(async move { Some(json!({"title": title, "synced": true})) }.boxed())
            });
        })
        .unwrap();

    store.set("todos.1", json!({"title": "ship"})).unwrap();
    settle().await;

    assert_eq!(
        store.get("todos.1"),
        Some(json!({"title": "SHIP", "synced": true}))
    );
}

/// Test that a computed value feeds an effect through the scheduler.
#[test]
fn computed_and_effect_on_deferred_queue() {
    let scheduler = Arc::new(QueueScheduler::new());
    let store = Store::with_config(
        StoreConfig::default().with_default_queue(Queue::Micro),
        scheduler.clone(),
    )
    .unwrap();
    store.set("cart", json!({"items": [2, 3]})).unwrap();

    let total = store.computed(|s| {
        s.get("cart.items")
            .and_then(|v| v.as_array().cloned())
            .map(|items| items.iter().filter_map(Value::as_i64).sum::<i64>())
            .unwrap_or(0)
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let total_clone = total.clone();
    let effect = store.effect(move |_| seen_clone.lock().push(total_clone.value().unwrap()));

    store.merge("cart.items", json!([5])).unwrap();
    store.merge("cart.items", json!([10])).unwrap();
    assert_eq!(*seen.lock(), vec![5]);

    scheduler.flush();
    assert_eq!(*seen.lock(), vec![5, 20]);

    effect.dispose();
    store.set("cart.items", json!([])).unwrap();
    scheduler.flush();
    assert_eq!(*seen.lock(), vec![5, 20]);
}

/// Test that the root only accepts objects.
#[test]
fn root_must_be_an_object() {
    let store = Store::new();
    assert!(matches!(
        store.set("", json!([1])),
        Err(StoreError::RootNotObject { .. })
    ));
    assert!(store.set("", json!({"fresh": 1})).is_ok());
}

/// Test that configs load from JSON.
#[test]
fn store_from_json_config() {
    let config = StoreConfig::from_json(
        r#"{"backend": "signal", "initial_state": {"route": {"path": "/"}}}"#,
    )
    .unwrap();
    let store = Store::with_config(config, Arc::new(QueueScheduler::new())).unwrap();

    assert_eq!(store.get("route.path"), Some(json!("/")));
    assert_eq!(store.config().backend, GraphBackend::Signal);
}
