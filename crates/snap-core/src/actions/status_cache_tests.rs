use super::*;
use crate::events::EventBus;
use crate::testing::{callback_for, connected, MemoryTransport, ScriptedHost};
use serde_json::Value;
use std::time::Duration;

async fn cache_for(host: &ScriptedHost) -> (Arc<StatusCache>, Dispatcher, Arc<MemoryTransport>) {
    let (messenger, transport) = connected(host, EventBus::new()).await;
    let dispatcher = Dispatcher::new(messenger);
    (Arc::new(StatusCache::new(dispatcher.clone())), dispatcher, transport)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn status_calls(transport: &MemoryTransport) -> Vec<Value> {
    transport
        .sent()
        .into_iter()
        .filter(|m| m["params"]["action"] == "STATUS")
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_gets_share_one_request() {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "name": "home", "elementType": "Page" }));
    let (cache, _, transport) = cache_for(&host).await;

    let (a, b) = tokio::join!(cache.get("4711.EN", false), cache.get("4711.EN", false));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.name.as_deref(), Some("home"));
    assert!(a.is_resolved());
    assert_eq!(status_calls(&transport).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_id_is_synthesized_locally() {
    let host = ScriptedHost::new();
    let (cache, _, transport) = cache_for(&host).await;

    let status = cache.get("custom:create-page:path:name", false).await.unwrap();
    assert_eq!(status.custom.as_deref(), Some("create-page:path:name"));
    assert_eq!(status.parts, vec!["create-page", "path", "name"]);
    assert!(status_calls(&transport).is_empty());
    assert!(cache.contains("custom:create-page:path:name"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_is_cached() {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "name": "unknown" }));
    let (cache, _, transport) = cache_for(&host).await;

    let first = cache.get("1.EN", false).await.unwrap();
    let second = cache.get("1.EN", false).await.unwrap();
    assert!(!first.is_resolved());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(status_calls(&transport).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_cached_until_invalidated() {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "name": 42 }));
    let (cache, _, transport) = cache_for(&host).await;

    assert!(matches!(
        cache.get("1.EN", false).await,
        Err(ActionError::InvalidResponse { .. })
    ));
    assert!(cache.get("1.EN", false).await.is_err());
    assert_eq!(status_calls(&transport).len(), 1);

    cache.invalidate(Some("1.EN"));
    assert!(cache.get("1.EN", false).await.is_err());
    assert_eq!(status_calls(&transport).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_all_starts_fresh_fetch_while_pending() {
    let host = ScriptedHost::new();
    host.silence(Action::Status);
    let (cache, _, transport) = cache_for(&host).await;

    let first_cache = cache.clone();
    let first = tokio::spawn(async move { first_cache.get("1.EN", false).await });
    settle().await;

    cache.invalidate(None);
    assert!(cache.is_empty());

    let second_cache = cache.clone();
    let second = tokio::spawn(async move { second_cache.get("1.EN", false).await });
    settle().await;

    let calls = status_calls(&transport);
    assert_eq!(calls.len(), 2);
    transport.inject(callback_for(&calls[0], json!({ "name": "old" })));
    transport.inject(callback_for(&calls[1], json!({ "name": "new" })));

    assert_eq!(first.await.unwrap().unwrap().name.as_deref(), Some("old"));
    assert_eq!(second.await.unwrap().unwrap().name.as_deref(), Some("new"));

    let cached = cache.get("1.EN", false).await.unwrap();
    assert_eq!(cached.name.as_deref(), Some("new"));
    assert_eq!(status_calls(&transport).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_refetches_settled_entry() {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "name": "home" }));
    let (cache, _, transport) = cache_for(&host).await;

    let first = cache.get("1.EN", false).await.unwrap();
    let refreshed = cache.get("1.EN", true).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &refreshed));
    assert_eq!(status_calls(&transport).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_shares_in_flight_request() {
    let host = ScriptedHost::new();
    host.silence(Action::Status);
    let (cache, _, transport) = cache_for(&host).await;

    let first_cache = cache.clone();
    let first = tokio::spawn(async move { first_cache.get("1.EN", false).await });
    settle().await;
    let second_cache = cache.clone();
    let second = tokio::spawn(async move { second_cache.get("1.EN", true).await });
    settle().await;

    let calls = status_calls(&transport);
    assert_eq!(calls.len(), 1);
    transport.inject(callback_for(&calls[0], json!({ "name": "home" })));

    let (a, b) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test(start_paused = true)]
async fn test_empty_preview_id_is_rejected() {
    let host = ScriptedHost::new();
    let (cache, _, _) = cache_for(&host).await;
    assert_eq!(cache.get("", false).await, Err(ActionError::MissingPreviewId));
}

#[tokio::test(start_paused = true)]
async fn test_status_request_carries_preview_language() {
    let host = ScriptedHost::new();
    let (cache, dispatcher, transport) = cache_for(&host).await;
    dispatcher.set_language(Some("DE".to_string()));

    cache.get("1.DE", false).await.unwrap();
    let calls = status_calls(&transport);
    assert_eq!(calls[0]["params"]["previewLanguage"], "DE");
    assert_eq!(calls[0]["params"]["previewId"], "1.DE");
}
