use std::{sync::Arc, time::Duration};

use scrollguard_lib::{
    blocker::{AttachOutcome, BlockCoordinator, TRIP_NOTICE},
    db::Database,
    rules::RuleRepository,
    store::{keys, read_block_flag, BlockFlag, KvStore, MemoryStore},
    surface::{RecordingSurface, Severity, SurfaceEvent},
};
use serde_json::json;
use tokio::time::sleep;

const POLL: Duration = Duration::from_millis(1500);

fn coordinator(store: &MemoryStore) -> (BlockCoordinator, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = BlockCoordinator::new(Arc::new(store.clone()), surface.clone())
        .with_poll_interval(POLL);
    (coordinator, surface)
}

async fn store_with_rule(domain: &str, limit_ms: u64) -> MemoryStore {
    let store = MemoryStore::new();
    RuleRepository::new(Arc::new(store.clone()))
        .save_rule(domain, limit_ms)
        .await
        .unwrap();
    store
}

/// Sends one event every 500 ms for `span_ms`.
async fn scroll_for(tab: &scrollguard_lib::Tab, span_ms: u64) {
    for _ in 0..=(span_ms / 500) {
        tab.record_activity();
        sleep(Duration::from_millis(500)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn continuous_scroll_past_limit_trips_exactly_once() {
    let store = store_with_rule("example.com", 60_000).await;
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("https://www.example.com/feed").await;
    assert_eq!(tab.outcome(), AttachOutcome::Tracking);

    scroll_for(&tab, 61_000).await;
    sleep(Duration::from_secs(5)).await;

    assert_eq!(surface.block_screens(), 1);
    let notices: Vec<_> = surface
        .events()
        .into_iter()
        .filter(|e| matches!(e, SurfaceEvent::Notice(..)))
        .collect();
    assert_eq!(
        notices,
        vec![SurfaceEvent::Notice(TRIP_NOTICE.to_string(), Severity::Warning)]
    );
    assert!(tab.is_blocked().await);
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Blocked);

    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn short_scrolling_stays_open() {
    let store = store_with_rule("example.com", 60_000).await;
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("example.com").await;
    scroll_for(&tab, 10_000).await;
    sleep(Duration::from_secs(3)).await;
    scroll_for(&tab, 10_000).await;
    sleep(Duration::from_secs(3)).await;

    assert!(surface.events().is_empty());
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Absent);
    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn already_blocked_site_shows_block_screen_on_attach() {
    let store = store_with_rule("example.com", 60_000).await;
    store.set(&keys::blocked("example.com"), json!(true)).await.unwrap();
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("https://news.example.com/").await;
    assert_eq!(tab.outcome(), AttachOutcome::AlreadyBlocked);
    assert_eq!(tab.domain(), Some("example.com"));
    assert_eq!(
        surface.events(),
        vec![SurfaceEvent::BlockScreen("example.com".into())]
    );

    // No tracking runs: scrolling changes nothing.
    scroll_for(&tab, 5_000).await;
    sleep(POLL * 2).await;
    assert_eq!(surface.events().len(), 1);
    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn removing_site_reloads_blocked_tab_within_one_poll() {
    let store = store_with_rule("example.com", 60_000).await;
    store.set(&keys::blocked("example.com"), json!(true)).await.unwrap();
    let (coordinator, surface) = coordinator(&store);
    let rules = RuleRepository::new(Arc::new(store.clone()));

    let tab = coordinator.attach("example.com").await;
    assert_eq!(tab.outcome(), AttachOutcome::AlreadyBlocked);

    assert!(rules.remove_rule("example.com").await);
    sleep(POLL + Duration::from_millis(100)).await;

    assert_eq!(surface.reloads(), 1);
    assert!(tab.is_reloaded().await);
    assert!(!tab.is_blocked().await);
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Unblocked);
    tokio::time::timeout(Duration::from_millis(10), tab.stopped())
        .await
        .expect("tab should have stopped");

    // After the reload the site is no longer capped.
    let fresh = coordinator.attach("example.com").await;
    assert_eq!(fresh.outcome(), AttachOutcome::Unmatched);
}

#[tokio::test(start_paused = true)]
async fn explicit_unblock_reloads_but_absent_flag_does_not() {
    let store = store_with_rule("example.com", 60_000).await;
    store.set(&keys::blocked("example.com"), json!(true)).await.unwrap();
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("example.com").await;
    store.remove(&keys::blocked("example.com")).await.unwrap();
    sleep(POLL * 3).await;
    assert_eq!(surface.reloads(), 0);
    assert!(tab.is_blocked().await);

    store.set(&keys::blocked("example.com"), json!(false)).await.unwrap();
    sleep(POLL + Duration::from_millis(100)).await;
    assert_eq!(surface.reloads(), 1);
    assert!(tab.is_reloaded().await);
    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn block_in_one_tab_reaches_the_other() {
    let store = store_with_rule("example.com", 2_000).await;
    let (first, first_surface) = coordinator(&store);
    let (second, second_surface) = coordinator(&store);

    let scrolling = first.attach("example.com").await;
    let idle = second.attach("m.example.com").await;

    scroll_for(&scrolling, 2_000).await;
    sleep(POLL * 3).await;

    assert_eq!(first_surface.block_screens(), 1);
    assert_eq!(
        second_surface.events(),
        vec![SurfaceEvent::BlockScreen("example.com".into())]
    );
    assert!(idle.is_blocked().await);

    // The idle tab no longer tracks scrolling of its own.
    scroll_for(&idle, 5_000).await;
    sleep(POLL).await;
    assert_eq!(second_surface.events().len(), 1);

    scrolling.teardown().await;
    idle.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_trips_agree_on_blocked() {
    let store = store_with_rule("example.com", 60_000).await;
    let (first, _) = coordinator(&store);
    let (second, _) = coordinator(&store);

    tokio::join!(first.trip("example.com"), second.trip("example.com"));

    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Blocked);
}

#[tokio::test(start_paused = true)]
async fn trip_shows_block_screen_even_if_store_write_fails() {
    let store = store_with_rule("example.com", 60_000).await;
    let (coordinator, surface) = coordinator(&store);

    store.set_unavailable(true);
    assert!(!coordinator.trip("example.com").await);
    assert_eq!(surface.block_screens(), 1);

    store.set_unavailable(false);
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Absent);
}

#[tokio::test(start_paused = true)]
async fn leftover_false_flag_does_not_undo_a_local_block() {
    let store = MemoryStore::new();
    let rules = RuleRepository::new(Arc::new(store.clone()));
    rules.save_rule("example.com", 60_000).await.unwrap();
    assert!(rules.remove_rule("example.com").await);
    rules.save_rule("example.com", 2_000).await.unwrap();
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Unblocked);
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("example.com").await;
    assert_eq!(tab.outcome(), AttachOutcome::Tracking);
    scroll_for(&tab, 2_000).await;

    // The trip fires while the store is down, so its write is lost.
    store.set_unavailable(true);
    sleep(Duration::from_secs(1)).await;
    assert!(tab.is_blocked().await);
    assert_eq!(surface.block_screens(), 1);

    store.set_unavailable(false);
    sleep(POLL * 3).await;
    assert_eq!(surface.reloads(), 0);
    assert!(tab.is_blocked().await);
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Blocked);

    // A real unblock afterwards still lifts it.
    store.set(&keys::blocked("example.com"), json!(false)).await.unwrap();
    sleep(POLL + Duration::from_millis(100)).await;
    assert_eq!(surface.reloads(), 1);
    assert!(tab.is_reloaded().await);
    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn unavailable_store_at_attach_means_no_rules() {
    let store = store_with_rule("example.com", 60_000).await;
    let (coordinator, surface) = coordinator(&store);

    store.set_unavailable(true);
    let tab = coordinator.attach("example.com").await;
    assert_eq!(tab.outcome(), AttachOutcome::Unmatched);
    assert!(surface.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn store_outage_during_poll_does_not_unblock() {
    let store = store_with_rule("example.com", 60_000).await;
    store.set(&keys::blocked("example.com"), json!(true)).await.unwrap();
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("example.com").await;
    store.set_unavailable(true);
    sleep(POLL * 3).await;
    assert_eq!(surface.reloads(), 0);
    assert!(tab.is_blocked().await);
    tab.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn most_specific_rule_sets_the_limit() {
    let store = store_with_rule("example.com", 600_000).await;
    RuleRepository::new(Arc::new(store.clone()))
        .save_rule("sub.example.com", 2_000)
        .await
        .unwrap();
    let (coordinator, surface) = coordinator(&store);

    let tab = coordinator.attach("a.sub.example.com").await;
    assert_eq!(tab.domain(), Some("sub.example.com"));
    scroll_for(&tab, 2_000).await;
    sleep(Duration::from_secs(2)).await;

    assert_eq!(
        surface.events().last(),
        Some(&SurfaceEvent::BlockScreen("sub.example.com".into()))
    );
    assert_eq!(read_block_flag(&store, "example.com").await, BlockFlag::Absent);
    tab.teardown().await;
}

#[tokio::test]
async fn sqlite_store_carries_removal_to_blocked_tab() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
    let rules = RuleRepository::new(Arc::new(db.clone()));
    rules.save_rule("example.com", 60_000).await.unwrap();
    db.set(&keys::blocked("example.com"), json!(true)).await.unwrap();

    let surface = Arc::new(RecordingSurface::new());
    let coordinator = BlockCoordinator::new(Arc::new(db.clone()), surface.clone())
        .with_poll_interval(Duration::from_millis(50));

    let tab = coordinator.attach("example.com").await;
    assert_eq!(tab.outcome(), AttachOutcome::AlreadyBlocked);

    rules.remove_rule("example.com").await;
    tokio::time::timeout(Duration::from_secs(2), tab.stopped())
        .await
        .expect("tab should reload after removal");

    assert_eq!(surface.reloads(), 1);
    assert_eq!(read_block_flag(&db, "example.com").await, BlockFlag::Unblocked);
}
