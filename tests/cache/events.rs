use biogate_cache::{CacheEvent, ResponseCache};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn hit_miss_and_store_events() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::clone(&log);
    let cache: ResponseCache<Value> = ResponseCache::new("responses").on_event(move |event| {
        let entry = match event {
            CacheEvent::Hit { key, .. } => format!("hit:{key}"),
            CacheEvent::Miss { key, .. } => format!("miss:{key}"),
            CacheEvent::Stored { key, .. } => format!("stored:{key}"),
        };
        events.lock().unwrap().push(entry);
    });

    cache.get("a");
    cache.set("a", json!(1), Duration::from_secs(60));
    cache.get("a");

    assert_eq!(*log.lock().unwrap(), vec!["miss:a", "stored:a", "hit:a"]);
}

#[test]
fn hit_and_miss_callbacks() {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let misses = Arc::new(Mutex::new(Vec::new()));
    let (h, m) = (Arc::clone(&hits), Arc::clone(&misses));
    let cache: ResponseCache<String> = ResponseCache::new("responses")
        .on_hit(move |key| h.lock().unwrap().push(key.to_string()))
        .on_miss(move |key| m.lock().unwrap().push(key.to_string()));

    cache.set("rs113488022", "BRAF".to_string(), Duration::from_secs(60));
    cache.get("rs113488022");
    cache.get("rs121913529");

    assert_eq!(*hits.lock().unwrap(), vec!["rs113488022"]);
    assert_eq!(*misses.lock().unwrap(), vec!["rs121913529"]);
}
