//! End-to-end behavior of the message cache against both storage engines.

use flipcast_core::cache::{CacheLimit, ChangeKind, MemoryEngine, MessageAddress, SqliteEngine, StorageEngine};
use flipcast_core::message::{STATUS_NEW, STATUS_READ};
use flipcast_core::{AppConfig, InAppMessage, MessageCache, MessageUpdate};

fn message(id: &str, created: i64) -> InAppMessage {
    InAppMessage {
        id: id.to_string(),
        config_name: "campaign".into(),
        message: format!("body of {id}"),
        tags: Some(vec!["promo".into(), "sale".into()]),
        status: STATUS_NEW.into(),
        ttl: 3_600,
        created,
        ..Default::default()
    }
}

fn memory() -> MessageCache<MemoryEngine> {
    MessageCache::with_preferences(MemoryEngine::new(), 16)
}

async fn sqlite() -> MessageCache<SqliteEngine> {
    MessageCache::open_in_memory().await.unwrap()
}

/// Run one scenario against a fresh cache on each engine.
macro_rules! both_engines {
    ($scenario:ident) => {
        $scenario(memory()).await;
        $scenario(sqlite().await).await;
    };
}

async fn ids<E: StorageEngine>(cache: &MessageCache<E>) -> Vec<String> {
    cache.messages().await.unwrap().into_iter().map(|m| m.id).collect()
}

async fn uniqueness<E: StorageEngine>(cache: MessageCache<E>) {
    cache.insert(&message("dup", 100)).await.unwrap();
    let second = InAppMessage { message: "replacement".into(), ..message("dup", 250) };
    cache.insert(&second).await.unwrap();

    let messages = cache.messages().await.unwrap();
    assert_eq!(messages, vec![second]);
}

#[tokio::test]
async fn test_duplicate_id_leaves_one_row() {
    both_engines!(uniqueness);
}

async fn trim_invariant<E: StorageEngine>(cache: MessageCache<E>) {
    const LIMIT: u32 = 5;
    cache.set_cache_limit(i64::from(LIMIT)).await.unwrap();

    // Deterministic id sequence with repeats.
    let mut state: u64 = 7;
    let mut history: Vec<String> = Vec::new();
    for step in 0..60 {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        let id = format!("m{}", (state >> 33) % 12);
        cache.insert(&message(&id, step)).await.unwrap();

        history.retain(|h| *h != id);
        history.push(id);

        let expected: Vec<String> = history.iter().rev().take(LIMIT as usize).cloned().collect();
        assert_eq!(ids(&cache).await, expected, "after insert {step}");
    }
}

#[tokio::test]
async fn test_trim_keeps_most_recent_distinct_ids() {
    both_engines!(trim_invariant);
}

async fn unbounded<E: StorageEngine>(cache: MessageCache<E>) {
    assert_eq!(cache.set_cache_limit(-1).await.unwrap(), CacheLimit::Unbounded);
    for i in 0..1000 {
        let inserted = cache.insert(&message(&format!("m{i}"), i)).await.unwrap();
        assert_eq!(inserted.evicted, 0);
    }
    assert_eq!(cache.count(None).await.unwrap(), 1000);
}

#[tokio::test]
async fn test_unbounded_keeps_everything() {
    both_engines!(unbounded);
}

async fn default_limit<E: StorageEngine>(cache: MessageCache<E>) {
    assert_eq!(cache.cache_limit().await.unwrap(), CacheLimit::Bounded(2));

    for (id, created) in [("a", 100), ("b", 200), ("c", 300)] {
        cache.insert(&message(id, created)).await.unwrap();
    }
    let created: Vec<i64> = cache.messages().await.unwrap().iter().map(|m| m.created).collect();
    assert_eq!(created, vec![300, 200]);
}

#[tokio::test]
async fn test_default_limit_keeps_two_newest() {
    both_engines!(default_limit);
}

async fn equal_created_ties<E: StorageEngine>(cache: MessageCache<E>) {
    for id in ["a", "b", "c"] {
        cache.insert(&message(id, 100)).await.unwrap();
    }
    assert_eq!(ids(&cache).await, vec!["c", "b"]);

    // A rewrite counts as the latest insert.
    cache.insert(&message("b", 100)).await.unwrap();
    cache.insert(&message("d", 100)).await.unwrap();
    assert_eq!(ids(&cache).await, vec!["d", "b"]);
}

#[tokio::test]
async fn test_equal_created_keeps_latest_inserts() {
    both_engines!(equal_created_ties);
}

async fn clear_empty<E: StorageEngine>(cache: MessageCache<E>) {
    assert_eq!(cache.delete_all().await.unwrap(), 0);
    assert!(cache.messages().await.unwrap().is_empty());
    assert_eq!(cache.delete(&MessageAddress::single("missing")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_all_on_empty_cache() {
    both_engines!(clear_empty);
}

async fn update_matched<E: StorageEngine>(cache: MessageCache<E>) {
    cache.set_cache_limit(10).await.unwrap();
    for (id, created) in [("a", 1), ("b", 2), ("c", 3)] {
        cache.insert(&message(id, created)).await.unwrap();
    }

    let patch = MessageUpdate {
        status: Some(STATUS_READ.into()),
        tags: Some(vec!["seen".into()]),
        ..Default::default()
    };
    assert_eq!(cache.update(&MessageAddress::single("b"), &patch).await.unwrap(), 1);

    let b = cache.message("b").await.unwrap().unwrap();
    assert_eq!(b.status, STATUS_READ);
    assert_eq!(b.tags, Some(vec!["seen".to_string()]));
    assert_eq!(b.message, "body of b");

    for id in ["a", "c"] {
        let untouched = cache.message(id).await.unwrap().unwrap();
        assert_eq!(untouched, message(id, untouched.created));
    }
}

#[tokio::test]
async fn test_update_changes_only_matched_rows() {
    both_engines!(update_matched);
}

async fn tag_absence<E: StorageEngine>(cache: MessageCache<E>) {
    let untagged = InAppMessage { tags: None, ..message("none", 1) };
    let empty = InAppMessage { tags: Some(Vec::new()), ..message("empty", 2) };
    let padded = InAppMessage { tags: Some(vec![" a ".into(), "b ".into()]), ..message("padded", 3) };
    cache.set_cache_limit(-1).await.unwrap();
    for m in [&untagged, &empty, &padded] {
        cache.insert(m).await.unwrap();
    }

    assert_eq!(cache.message("none").await.unwrap().unwrap().tags, None);
    assert_eq!(cache.message("empty").await.unwrap().unwrap().tags, None);
    assert_eq!(
        cache.message("padded").await.unwrap().unwrap().tags,
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[tokio::test]
async fn test_tags_read_back_without_empty_lists() {
    both_engines!(tag_absence);
}

async fn notifications<E: StorageEngine>(cache: MessageCache<E>) {
    let mut rx = cache.subscribe();
    cache.insert(&message("a", 1)).await.unwrap();
    cache.delete_one("missing").await.unwrap();
    cache.delete_all().await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, ChangeKind::Inserted);
    assert_eq!(first.address, MessageAddress::AllMessages);
    assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Deleted);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_observers_see_effective_changes() {
    both_engines!(notifications);
}

#[tokio::test]
async fn test_file_cache_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig { db_path: dir.path().join("messages.sqlite"), ..Default::default() };

    let cache = MessageCache::open(&config).await.unwrap();
    cache.set_cache_limit(3).await.unwrap();
    for (id, created) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        cache.insert(&message(id, created)).await.unwrap();
    }
    cache.mark_read("c").await.unwrap();
    cache.close().await.unwrap();

    let cache = MessageCache::open(&config).await.unwrap();
    assert_eq!(cache.cache_limit().await.unwrap(), CacheLimit::Bounded(3));
    assert_eq!(ids(&cache).await, vec!["d", "c", "b"]);
    assert!(cache.message("c").await.unwrap().unwrap().is_read());
    cache.close().await.unwrap();
}
