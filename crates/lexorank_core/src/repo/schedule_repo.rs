//! Rebalance marker persistence.
//!
//! # Responsibility
//! - Record "scope X of list T requires rebalancing" markers.
//! - Expose pending markers to the rebalance worker in scheduling order.
//!
//! # Invariants
//! - At most one marker exists per `(list_name, scope_key)`.
//! - The list-wide scope is persisted as `scope_key = ''` and read back as
//!   `None`.

use super::rank_repo::{RankStoreError, RankStoreResult};
use super::schema::ensure_table_ready;
use crate::model::ranked_item::ListScope;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

const GLOBAL_SCOPE_KEY: &str = "";

/// Pending rebalancing request for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceMarker {
    pub scope: ListScope,
    /// Epoch ms when the marker was first created.
    pub scheduled_at: i64,
}

/// Store of pending rebalance markers.
pub trait ScheduleStore {
    /// Creates the marker; returns `false` when one already existed.
    fn schedule(&self, scope: &ListScope) -> RankStoreResult<bool>;
    fn is_scheduled(&self, scope: &ListScope) -> RankStoreResult<bool>;
    /// Oldest markers first.
    fn pending(&self, limit: Option<u32>) -> RankStoreResult<Vec<RebalanceMarker>>;
    /// Removes the marker; returns `false` when there was none.
    fn clear(&self, scope: &ListScope) -> RankStoreResult<bool>;
}

/// SQLite-backed marker store.
#[derive(Clone, Copy)]
pub struct SqliteScheduleStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RankStoreResult<Self> {
        ensure_table_ready(
            conn,
            "scheduled_rebalancing",
            &["list_name", "scope_key", "scheduled_at"],
        )?;
        Ok(Self { conn })
    }
}

impl ScheduleStore for SqliteScheduleStore<'_> {
    fn schedule(&self, scope: &ListScope) -> RankStoreResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO scheduled_rebalancing (list_name, scope_key)
             VALUES (?1, ?2);",
            params![scope.list, stored_scope_key(scope)],
        )?;
        Ok(inserted == 1)
    }

    fn is_scheduled(&self, scope: &ListScope) -> RankStoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM scheduled_rebalancing
                WHERE list_name = ?1
                  AND scope_key = ?2
            );",
            params![scope.list, stored_scope_key(scope)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn pending(&self, limit: Option<u32>) -> RankStoreResult<Vec<RebalanceMarker>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);
        let mut stmt = self.conn.prepare(
            "SELECT list_name, scope_key, scheduled_at
             FROM scheduled_rebalancing
             ORDER BY scheduled_at ASC, list_name ASC, scope_key ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([limit])?;
        let mut markers = Vec::new();
        while let Some(row) = rows.next()? {
            markers.push(parse_marker_row(row)?);
        }
        Ok(markers)
    }

    fn clear(&self, scope: &ListScope) -> RankStoreResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM scheduled_rebalancing
             WHERE list_name = ?1
               AND scope_key = ?2;",
            params![scope.list, stored_scope_key(scope)],
        )?;
        Ok(removed == 1)
    }
}

fn stored_scope_key(scope: &ListScope) -> &str {
    scope.scope_key().unwrap_or(GLOBAL_SCOPE_KEY)
}

fn parse_marker_row(row: &Row<'_>) -> RankStoreResult<RebalanceMarker> {
    let list_name: String = row.get(0)?;
    if list_name.is_empty() {
        return Err(RankStoreError::InvalidData(
            "empty list_name in scheduled_rebalancing".to_string(),
        ));
    }
    let scope_key: String = row.get(1)?;
    let scope = if scope_key == GLOBAL_SCOPE_KEY {
        ListScope::global(list_name)
    } else {
        ListScope::scoped(list_name, scope_key)
    };
    Ok(RebalanceMarker {
        scope,
        scheduled_at: row.get(2)?,
    })
}
