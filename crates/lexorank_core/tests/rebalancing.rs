use lexorank_core::db::open_db_in_memory;
use lexorank_core::{
    ItemId, ListConfig, ListScope, Rank, RankConfig, RankStore, ScheduleStore, ScopedList,
    SqliteRankStore, SqliteScheduleStore,
};
use rusqlite::Connection;

type SqliteList<'conn> = ScopedList<SqliteRankStore<'conn>, SqliteScheduleStore<'conn>>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn tasks_with_threshold(conn: &Connection, rebalancing_length: usize) -> SqliteList<'_> {
    let config = ListConfig::new("tasks")
        .scoped()
        .insert_to_bottom()
        .with_rank(RankConfig {
            rebalancing_length,
            ..RankConfig::default()
        });
    let store = SqliteRankStore::try_new(conn).unwrap();
    let schedule = SqliteScheduleStore::try_new(conn).unwrap();
    ScopedList::new(config, store, schedule).unwrap()
}

fn set_rank(conn: &Connection, item: ItemId, rank: &str) {
    SqliteRankStore::try_new(conn)
        .unwrap()
        .write_rank(item, &Rank::new(rank))
        .unwrap();
}

/// Fills `scope` with a, x, b where x sits in an exhausted gap (7 digits).
fn exhaust_gap(conn: &Connection, tasks: &SqliteList<'_>, scope: &str) -> [ItemId; 3] {
    let a = tasks.insert(Some(scope), None, "a").unwrap().item_uuid;
    let b = tasks.insert(Some(scope), None, "b").unwrap().item_uuid;
    let x = tasks.insert(Some(scope), None, "x").unwrap().item_uuid;
    set_rank(conn, a, "bbbbbb");
    set_rank(conn, b, "bbbbbc");
    let rank = tasks.move_after(x, a).unwrap();
    assert_eq!(rank, Rank::new("bbbbbbm"));
    [a, x, b]
}

#[test]
fn threshold_one_flags_only_written_scope() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 1);

    tasks.insert(Some("busy"), None, "a").unwrap();

    assert!(tasks.needs_rebalancing(Some("busy")).unwrap());
    assert!(tasks.rebalancing_scheduled(Some("busy")).unwrap());
    assert!(!tasks.needs_rebalancing(Some("quiet")).unwrap());
    assert!(!tasks.rebalancing_scheduled(Some("quiet")).unwrap());
}

#[test]
fn crossing_threshold_schedules_affected_scope_once() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 7);
    tasks.insert(Some("other"), None, "o1").unwrap();
    tasks.insert(Some("other"), None, "o2").unwrap();

    assert!(!tasks.needs_rebalancing(Some("hot")).unwrap());
    let [a, _, _] = exhaust_gap(&conn, &tasks, "hot");

    assert!(tasks.needs_rebalancing(Some("hot")).unwrap());
    assert!(tasks.rebalancing_scheduled(Some("hot")).unwrap());
    assert!(!tasks.needs_rebalancing(Some("other")).unwrap());
    assert!(!tasks.rebalancing_scheduled(Some("other")).unwrap());

    // Another write in the flagged scope keeps a single marker.
    tasks.move_to_top(a).unwrap();
    let schedule = SqliteScheduleStore::try_new(&conn).unwrap();
    let pending = schedule.pending(None).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].scope, ListScope::scoped("tasks", "hot"));
}

#[test]
fn rebalance_scope_restores_default_length_and_order() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 7);
    let [a, x, b] = exhaust_gap(&conn, &tasks, "hot");

    let rebalanced = tasks.rebalance_scope(Some("hot")).unwrap();

    assert_eq!(rebalanced, 3);
    let items = tasks.list(Some("hot")).unwrap();
    let ids: Vec<ItemId> = items.iter().map(|item| item.item_uuid).collect();
    assert_eq!(ids, vec![a, x, b]);
    for item in &items {
        assert_eq!(item.rank.as_ref().unwrap().len(), 6);
    }
    assert!(!tasks.needs_rebalancing(Some("hot")).unwrap());
    assert!(!tasks.rebalancing_scheduled(Some("hot")).unwrap());
}

#[test]
fn rebalance_scope_spaces_ranks_evenly() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 128);
    tasks.insert(Some("pair"), None, "first").unwrap();
    tasks.insert(Some("pair"), None, "second").unwrap();

    tasks.rebalance_scope(Some("pair")).unwrap();

    let ranks: Vec<Rank> = tasks
        .list(Some("pair"))
        .unwrap()
        .into_iter()
        .filter_map(|item| item.rank)
        .collect();
    assert_eq!(ranks, vec![Rank::new("mzzzzz"), Rank::new("zzzzzy")]);
}

#[test]
fn rebalance_of_empty_scope_is_a_no_op() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 128);

    assert_eq!(tasks.rebalance_scope(Some("empty")).unwrap(), 0);
}

#[test]
fn rebalance_leaves_other_scopes_untouched() {
    let conn = setup();
    let tasks = tasks_with_threshold(&conn, 7);
    let untouched = tasks.insert(Some("other"), None, "o1").unwrap();
    exhaust_gap(&conn, &tasks, "hot");

    tasks.rebalance_scope(Some("hot")).unwrap();

    let store = SqliteRankStore::try_new(&conn).unwrap();
    let reloaded = store.load_item(untouched.item_uuid).unwrap().unwrap();
    assert_eq!(reloaded.rank, untouched.rank);
}
