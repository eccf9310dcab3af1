use std::time::Duration;

use lexorank_core::db::{open_db, open_db_in_memory};
use lexorank_core::{
    Direction, ListConfig, ListScope, Rank, RankStore, RankStoreError, ScheduleStore, ScopeLease,
    ScopedList, ScopedListError, SqliteRankStore, SqliteScheduleStore,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn rank(value: &str) -> Rank {
    Rank::new(value)
}

#[test]
fn boundaries_neighbours_and_count_follow_rank_order() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let scope = ListScope::scoped("tasks", "7");
    let low = store.insert_item(&scope, &rank("ffffff"), "low").unwrap();
    let mid = store.insert_item(&scope, &rank("mmmmmm"), "mid").unwrap();
    let high = store.insert_item(&scope, &rank("tttttt"), "high").unwrap();
    store
        .insert_item(&ListScope::scoped("tasks", "8"), &rank("aaaaab"), "elsewhere")
        .unwrap();

    assert_eq!(
        store.read_scope_boundaries(&scope).unwrap(),
        (Some(rank("ffffff")), Some(rank("tttttt")))
    );
    assert_eq!(store.count_scope(&scope).unwrap(), 3);
    assert_eq!(
        store.read_neighbor(mid.item_uuid, Direction::Before).unwrap(),
        Some(rank("ffffff"))
    );
    assert_eq!(
        store.read_neighbor(mid.item_uuid, Direction::After).unwrap(),
        Some(rank("tttttt"))
    );
    assert_eq!(
        store.read_neighbor(low.item_uuid, Direction::Before).unwrap(),
        None
    );
    assert_eq!(
        store
            .read_scope_members_ordered(&scope)
            .unwrap(),
        vec![low.item_uuid, mid.item_uuid, high.item_uuid]
    );
}

#[test]
fn empty_scope_has_no_boundaries() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let scope = ListScope::global("boards");

    assert_eq!(store.read_scope_boundaries(&scope).unwrap(), (None, None));
    assert_eq!(store.count_scope(&scope).unwrap(), 0);
    assert!(store.list_scope(&scope).unwrap().is_empty());
}

#[test]
fn moved_item_is_invisible_until_reranked() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let from = ListScope::scoped("tasks", "a");
    let to = ListScope::scoped("tasks", "b");
    let item = store.insert_item(&from, &rank("mzzzzz"), "item").unwrap();

    store.move_item_to_scope(item.item_uuid, &to).unwrap();

    let loaded = store.load_item(item.item_uuid).unwrap().unwrap();
    assert_eq!(loaded.scope_key.as_deref(), Some("b"));
    assert_eq!(loaded.rank, None);
    assert_eq!(store.count_scope(&from).unwrap(), 0);
    assert_eq!(store.count_scope(&to).unwrap(), 0);
    assert_eq!(store.read_scope_boundaries(&to).unwrap(), (None, None));
    assert!(!store.has_rank_length_at_least(&to, 1).unwrap());
}

#[test]
fn dropped_lease_rolls_back_writes() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let scope = ListScope::global("boards");
    let item = store.insert_item(&scope, &rank("mzzzzz"), "item").unwrap();

    {
        let lease = store.acquire_scope_lock(&scope).unwrap();
        assert_eq!(lease.scope(), &scope);
        store.write_rank(item.item_uuid, &rank("bbbbbb")).unwrap();
    }
    assert_eq!(
        store.load_item(item.item_uuid).unwrap().unwrap().rank,
        Some(rank("mzzzzz"))
    );

    let lease = store.acquire_scope_lock(&scope).unwrap();
    store
        .write_ranks_batch(&[(item.item_uuid, rank("cccccc"))])
        .unwrap();
    lease.commit().unwrap();
    assert_eq!(
        store.load_item(item.item_uuid).unwrap().unwrap().rank,
        Some(rank("cccccc"))
    );
}

#[test]
fn batch_write_is_all_or_nothing() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let scope = ListScope::global("boards");
    let item = store.insert_item(&scope, &rank("mzzzzz"), "item").unwrap();
    let missing = Uuid::new_v4();

    let err = store
        .write_ranks_batch(&[(item.item_uuid, rank("bbbbbb")), (missing, rank("cccccc"))])
        .unwrap_err();

    assert!(matches!(err, RankStoreError::ItemNotFound(id) if id == missing));
    assert_eq!(
        store.load_item(item.item_uuid).unwrap().unwrap().rank,
        Some(rank("mzzzzz"))
    );
}

#[test]
fn rank_length_check_counts_characters() {
    let conn = setup();
    let store = SqliteRankStore::try_new(&conn).unwrap();
    let scope = ListScope::global("boards");
    store.insert_item(&scope, &rank("bbbbbbm"), "item").unwrap();

    assert!(store.has_rank_length_at_least(&scope, 7).unwrap());
    assert!(!store.has_rank_length_at_least(&scope, 8).unwrap());
}

#[test]
fn schedule_markers_are_deduplicated_per_scope() {
    let conn = setup();
    let schedule = SqliteScheduleStore::try_new(&conn).unwrap();
    let global = ListScope::global("boards");
    let scoped = ListScope::scoped("tasks", "7");

    assert!(schedule.schedule(&global).unwrap());
    assert!(!schedule.schedule(&global).unwrap());
    assert!(schedule.schedule(&scoped).unwrap());

    let pending = schedule.pending(None).unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().any(|marker| marker.scope == global));
    assert!(pending.iter().any(|marker| marker.scope == scoped));
    assert_eq!(schedule.pending(Some(1)).unwrap().len(), 1);

    assert!(schedule.clear(&global).unwrap());
    assert!(!schedule.clear(&global).unwrap());
    assert!(!schedule.is_scheduled(&global).unwrap());
    assert!(schedule.is_scheduled(&scoped).unwrap());
}

#[test]
fn second_connection_times_out_while_scope_is_leased() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lock.db");
    let holder = open_db(&path).unwrap();
    let waiter = open_db(&path).unwrap();
    waiter.busy_timeout(Duration::from_millis(50)).unwrap();
    let holder_store = SqliteRankStore::try_new(&holder).unwrap();
    let waiter_store = SqliteRankStore::try_new(&waiter).unwrap();
    let scope = ListScope::global("boards");

    let lease = holder_store.acquire_scope_lock(&scope).unwrap();

    match waiter_store.acquire_scope_lock(&scope) {
        Err(RankStoreError::LockTimeout { scope: locked }) => assert_eq!(locked, scope),
        Err(other) => panic!("expected lock timeout, got {other}"),
        Ok(_) => panic!("second lease acquired while the first is held"),
    }

    let boards = ScopedList::new(
        ListConfig::new("boards"),
        waiter_store,
        SqliteScheduleStore::try_new(&waiter).unwrap(),
    )
    .unwrap();
    let err = boards.insert(None, None, "blocked").unwrap_err();
    assert!(matches!(
        err,
        ScopedListError::Store(RankStoreError::LockTimeout { .. })
    ));

    drop(lease);
    assert_eq!(holder_store.count_scope(&scope).unwrap(), 0);
    assert!(boards.list(None).unwrap().is_empty());
}
