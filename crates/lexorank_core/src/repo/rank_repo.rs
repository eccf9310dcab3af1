//! Ranked item persistence contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the persistence collaborator consumed by scoped list services.
//! - Keep SQL details and rank ordering queries inside the repository.
//!
//! # Invariants
//! - Scope members are ordered by `rank ASC, item_uuid ASC`; rank order is
//!   SQLite `BINARY` collation, identical to Rust string order.
//! - Items whose rank is cleared are invisible to boundary, neighbour,
//!   member and count queries.
//! - A scope lease is an `IMMEDIATE` transaction; dropping it uncommitted
//!   rolls every write back.

use super::schema::ensure_table_ready;
use crate::db::DbError;
use crate::model::ranked_item::{Direction, ItemId, ListScope, RankedItem};
use crate::rank::Rank;
use log::debug;
use rusqlite::{
    params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    item_uuid,
    list_name,
    scope_key,
    rank,
    label,
    created_at,
    updated_at
FROM ranked_items";

const ITEM_COLUMNS: &[&str] = &[
    "item_uuid",
    "list_name",
    "scope_key",
    "rank",
    "label",
    "created_at",
    "updated_at",
];

/// Result type used by ranked item persistence.
pub type RankStoreResult<T> = Result<T, RankStoreError>;

/// Errors from ranked item and rebalance marker persistence.
#[derive(Debug)]
pub enum RankStoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target item does not exist in the addressed list.
    ItemNotFound(ItemId),
    /// Another writer held the scope beyond the busy timeout.
    LockTimeout { scope: ListScope },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RankStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "ranked item not found: {id}"),
            Self::LockTimeout { scope } => write!(f, "timed out waiting for scope lock on {scope}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "rank repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "rank repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "rank repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid ranked item data: {message}"),
        }
    }
}

impl Error for RankStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RankStoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RankStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Exclusive hold on one scope's membership.
///
/// Dropping a lease without `commit` discards every write made under it.
pub trait ScopeLease {
    fn scope(&self) -> &ListScope;
    fn commit(self) -> RankStoreResult<()>;
}

/// Persistence collaborator for scoped rank lists.
pub trait RankStore {
    type Lease: ScopeLease;

    /// Serializes writers on `scope` until the lease is committed or dropped.
    fn acquire_scope_lock(&self, scope: &ListScope) -> RankStoreResult<Self::Lease>;
    /// Lowest and highest rank in scope.
    fn read_scope_boundaries(
        &self,
        scope: &ListScope,
    ) -> RankStoreResult<(Option<Rank>, Option<Rank>)>;
    /// Closest rank before or after `item` within the item's scope.
    fn read_neighbor(&self, item: ItemId, direction: Direction) -> RankStoreResult<Option<Rank>>;
    /// Ranked member ids, ascending by rank.
    fn read_scope_members_ordered(&self, scope: &ListScope) -> RankStoreResult<Vec<ItemId>>;
    /// Number of ranked members.
    fn count_scope(&self, scope: &ListScope) -> RankStoreResult<u64>;
    fn write_rank(&self, item: ItemId, rank: &Rank) -> RankStoreResult<()>;
    /// Writes all ranks or none.
    fn write_ranks_batch(&self, ranks: &[(ItemId, Rank)]) -> RankStoreResult<()>;
    fn load_item(&self, item: ItemId) -> RankStoreResult<Option<RankedItem>>;
    fn insert_item(
        &self,
        scope: &ListScope,
        rank: &Rank,
        label: &str,
    ) -> RankStoreResult<RankedItem>;
    /// Moves `item` into `scope` and clears its rank.
    fn move_item_to_scope(&self, item: ItemId, scope: &ListScope) -> RankStoreResult<()>;
    /// Whether any rank in scope has at least `length` digits.
    fn has_rank_length_at_least(&self, scope: &ListScope, length: usize) -> RankStoreResult<bool>;
    /// Ranked members, ascending by rank.
    fn list_scope(&self, scope: &ListScope) -> RankStoreResult<Vec<RankedItem>>;
}

/// SQLite-backed ranked item store.
#[derive(Clone, Copy)]
pub struct SqliteRankStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRankStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RankStoreResult<Self> {
        ensure_table_ready(conn, "ranked_items", ITEM_COLUMNS)?;
        Ok(Self { conn })
    }
}

/// Scope lease backed by an `IMMEDIATE` SQLite transaction.
pub struct SqliteScopeLease<'conn> {
    tx: Transaction<'conn>,
    scope: ListScope,
    acquired_at: Instant,
}

impl ScopeLease for SqliteScopeLease<'_> {
    fn scope(&self) -> &ListScope {
        &self.scope
    }

    fn commit(self) -> RankStoreResult<()> {
        let held_ms = self.acquired_at.elapsed().as_millis();
        let scope = self.scope;
        self.tx
            .commit()
            .map_err(|err| lock_error(err, &scope))?;
        debug!("event=scope_lease module=repo status=ok scope={scope} held_ms={held_ms}");
        Ok(())
    }
}

impl<'conn> RankStore for SqliteRankStore<'conn> {
    type Lease = SqliteScopeLease<'conn>;

    fn acquire_scope_lock(&self, scope: &ListScope) -> RankStoreResult<Self::Lease> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| lock_error(err, scope))?;
        Ok(SqliteScopeLease {
            tx,
            scope: scope.clone(),
            acquired_at: Instant::now(),
        })
    }

    fn read_scope_boundaries(
        &self,
        scope: &ListScope,
    ) -> RankStoreResult<(Option<Rank>, Option<Rank>)> {
        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(rank), MAX(rank)
             FROM ranked_items
             WHERE list_name = ?1
               AND scope_key IS ?2
               AND rank IS NOT NULL;",
            params![scope.list, scope.scope_key()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((first.map(Rank::new), last.map(Rank::new)))
    }

    fn read_neighbor(&self, item: ItemId, direction: Direction) -> RankStoreResult<Option<Rank>> {
        let current = self
            .load_item(item)?
            .ok_or(RankStoreError::ItemNotFound(item))?;
        let Some(rank) = current.rank else {
            return Err(RankStoreError::InvalidData(format!(
                "item {item} has no rank to look around"
            )));
        };

        let sql = match direction {
            Direction::Before => {
                "SELECT rank
                 FROM ranked_items
                 WHERE list_name = ?1
                   AND scope_key IS ?2
                   AND rank < ?3
                 ORDER BY rank DESC
                 LIMIT 1;"
            }
            Direction::After => {
                "SELECT rank
                 FROM ranked_items
                 WHERE list_name = ?1
                   AND scope_key IS ?2
                   AND rank > ?3
                 ORDER BY rank ASC
                 LIMIT 1;"
            }
        };
        let neighbor: Option<String> = self
            .conn
            .query_row(
                sql,
                params![current.list_name, current.scope_key, rank.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(neighbor.map(Rank::new))
    }

    fn read_scope_members_ordered(&self, scope: &ListScope) -> RankStoreResult<Vec<ItemId>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_uuid
             FROM ranked_items
             WHERE list_name = ?1
               AND scope_key IS ?2
               AND rank IS NOT NULL
             ORDER BY rank ASC, item_uuid ASC;",
        )?;
        let mut rows = stmt.query(params![scope.list, scope.scope_key()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "ranked_items.item_uuid")?);
        }
        Ok(ids)
    }

    fn count_scope(&self, scope: &ListScope) -> RankStoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM ranked_items
             WHERE list_name = ?1
               AND scope_key IS ?2
               AND rank IS NOT NULL;",
            params![scope.list, scope.scope_key()],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RankStoreError::InvalidData(format!("negative scope count {count}")))
    }

    fn write_rank(&self, item: ItemId, rank: &Rank) -> RankStoreResult<()> {
        update_rank(self.conn, item, rank)
    }

    fn write_ranks_batch(&self, ranks: &[(ItemId, Rank)]) -> RankStoreResult<()> {
        if !self.conn.is_autocommit() {
            // Already inside a lease: the enclosing transaction is the unit.
            for (item, rank) in ranks {
                update_rank(self.conn, *item, rank)?;
            }
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (item, rank) in ranks {
            update_rank(&tx, *item, rank)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_item(&self, item: ItemId) -> RankStoreResult<Option<RankedItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE item_uuid = ?1;"))?;
        let mut rows = stmt.query([item.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_ranked_item_row(row)?));
        }
        Ok(None)
    }

    fn insert_item(
        &self,
        scope: &ListScope,
        rank: &Rank,
        label: &str,
    ) -> RankStoreResult<RankedItem> {
        let item_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO ranked_items (
                item_uuid,
                list_name,
                scope_key,
                rank,
                label
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                item_uuid.to_string(),
                scope.list,
                scope.scope_key(),
                rank.as_str(),
                label,
            ],
        )?;
        self.load_item(item_uuid)?
            .ok_or(RankStoreError::ItemNotFound(item_uuid))
    }

    fn move_item_to_scope(&self, item: ItemId, scope: &ListScope) -> RankStoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE ranked_items
             SET scope_key = ?3,
                 rank = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_uuid = ?1
               AND list_name = ?2;",
            params![item.to_string(), scope.list, scope.scope_key()],
        )?;
        if changed == 0 {
            return Err(RankStoreError::ItemNotFound(item));
        }
        Ok(())
    }

    fn has_rank_length_at_least(&self, scope: &ListScope, length: usize) -> RankStoreResult<bool> {
        let length = i64::try_from(length)
            .map_err(|_| RankStoreError::InvalidData(format!("rank length {length} too large")))?;
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM ranked_items
                WHERE list_name = ?1
                  AND scope_key IS ?2
                  AND length(rank) >= ?3
            );",
            params![scope.list, scope.scope_key(), length],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_scope(&self, scope: &ListScope) -> RankStoreResult<Vec<RankedItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE list_name = ?1
               AND scope_key IS ?2
               AND rank IS NOT NULL
             ORDER BY rank ASC, item_uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![scope.list, scope.scope_key()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_ranked_item_row(row)?);
        }
        Ok(items)
    }
}

fn update_rank(conn: &Connection, item: ItemId, rank: &Rank) -> RankStoreResult<()> {
    let changed = conn.execute(
        "UPDATE ranked_items
         SET rank = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE item_uuid = ?1;",
        params![item.to_string(), rank.as_str()],
    )?;
    if changed == 0 {
        return Err(RankStoreError::ItemNotFound(item));
    }
    Ok(())
}

fn lock_error(err: rusqlite::Error, scope: &ListScope) -> RankStoreError {
    let err = DbError::Sqlite(err);
    if err.is_busy() {
        return RankStoreError::LockTimeout {
            scope: scope.clone(),
        };
    }
    RankStoreError::Db(err)
}

fn parse_ranked_item_row(row: &Row<'_>) -> RankStoreResult<RankedItem> {
    let item_uuid_text: String = row.get("item_uuid")?;
    let item_uuid = parse_uuid(&item_uuid_text, "ranked_items.item_uuid")?;

    let scope_key: Option<String> = row.get("scope_key")?;
    if scope_key.as_deref() == Some("") {
        return Err(RankStoreError::InvalidData(format!(
            "empty scope_key for item {item_uuid}"
        )));
    }

    Ok(RankedItem {
        item_uuid,
        list_name: row.get("list_name")?,
        scope_key,
        rank: row.get::<_, Option<String>>("rank")?.map(Rank::new),
        label: row.get("label")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RankStoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RankStoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
