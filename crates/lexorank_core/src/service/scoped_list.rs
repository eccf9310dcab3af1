//! Scoped ranked list use-case service.
//!
//! # Responsibility
//! - Assign ranks on insert, move, and scope change for one list.
//! - Detect and schedule rebalancing; rebalance a scope on request.
//!
//! # Invariants
//! - Every write runs under the scope lease from neighbour read to commit;
//!   on any error the lease is dropped and nothing is persisted.
//! - A scoped list never runs without a scope key; an unscoped list never
//!   accepts one.
//! - An item that changes scope is re-placed as if freshly inserted into
//!   the new scope, never relative to its old neighbours.
//! - Rebalancing need is checked after every write, never enforced.

use crate::config::{ConfigError, ListConfig};
use crate::model::ranked_item::{Direction, InsertPosition, ItemId, ListScope, RankedItem};
use crate::rank::{Rank, RankArithmetic, RankError, RebalanceEngine};
use crate::repo::rank_repo::{RankStore, RankStoreError, ScopeLease};
use crate::repo::schedule_repo::ScheduleStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from scoped list operations.
#[derive(Debug)]
pub enum ScopedListError {
    /// List configuration failed validation.
    InvalidConfig(ConfigError),
    /// Rank computation failed; `RebalancingRequired` means rebalance, then retry.
    Rank(RankError),
    /// Scoped list called without a scope key.
    ScopeRequired { list: String },
    /// Unscoped list called with a scope key.
    UnexpectedScope { list: String, scope: String },
    /// Item does not exist in this list.
    ItemNotFound(ItemId),
    /// Item has no rank to move relative to.
    Unranked(ItemId),
    /// Item and move target live in different scopes.
    ScopeMismatch { item: ItemId, target: ItemId },
    /// Item changed scope between lookup and lease acquisition.
    ScopeChanged(ItemId),
    /// Persistence failure, including `LockTimeout`.
    Store(RankStoreError),
}

impl Display for ScopedListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(err) => write!(f, "invalid list config: {err}"),
            Self::Rank(err) => write!(f, "{err}"),
            Self::ScopeRequired { list } => write!(f, "list `{list}` requires a scope key"),
            Self::UnexpectedScope { list, scope } => {
                write!(f, "list `{list}` is not scoped, got scope key `{scope}`")
            }
            Self::ItemNotFound(id) => write!(f, "ranked item not found: {id}"),
            Self::Unranked(id) => write!(f, "ranked item has no rank: {id}"),
            Self::ScopeMismatch { item, target } => {
                write!(f, "item {item} and target {target} are in different scopes")
            }
            Self::ScopeChanged(id) => write!(f, "item {id} changed scope concurrently"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ScopedListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Rank(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RankError> for ScopedListError {
    fn from(value: RankError) -> Self {
        Self::Rank(value)
    }
}

impl From<ConfigError> for ScopedListError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

impl From<RankStoreError> for ScopedListError {
    fn from(value: RankStoreError) -> Self {
        match value {
            RankStoreError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::Store(other),
        }
    }
}

pub type ScopedListResult<T> = Result<T, ScopedListError>;

/// Ordering lifecycle of one list over a persistence collaborator.
pub struct ScopedList<R: RankStore, Q: ScheduleStore> {
    config: ListConfig,
    arithmetic: RankArithmetic,
    engine: RebalanceEngine,
    store: R,
    schedule: Q,
}

impl<R: RankStore, Q: ScheduleStore> ScopedList<R, Q> {
    /// Creates the service after validating `config`.
    pub fn new(config: ListConfig, store: R, schedule: Q) -> ScopedListResult<Self> {
        config.validate()?;
        let arithmetic = RankArithmetic::new(&config.rank);
        Ok(Self {
            config,
            arithmetic,
            engine: RebalanceEngine::new(arithmetic),
            store,
            schedule,
        })
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn arithmetic(&self) -> &RankArithmetic {
        &self.arithmetic
    }

    /// Resolves a scope key against this list's scoping rule.
    ///
    /// # Errors
    /// - `ScopeRequired` for a scoped list and a missing or blank key.
    /// - `UnexpectedScope` for an unscoped list and any key.
    pub fn scope(&self, scope_key: Option<&str>) -> ScopedListResult<ListScope> {
        let list = self.config.name.as_str();
        match (self.config.scoped, scope_key) {
            (true, Some(key)) if !key.trim().is_empty() => Ok(ListScope::scoped(list, key)),
            (true, _) => Err(ScopedListError::ScopeRequired {
                list: list.to_string(),
            }),
            (false, Some(key)) => Err(ScopedListError::UnexpectedScope {
                list: list.to_string(),
                scope: key.to_string(),
            }),
            (false, None) => Ok(ListScope::global(list)),
        }
    }

    /// Position used when a caller does not choose one.
    pub fn default_position(&self) -> InsertPosition {
        InsertPosition::from_bottom_flag(self.config.insert_to_bottom)
    }

    /// Loads one item of this list.
    pub fn get(&self, item: ItemId) -> ScopedListResult<RankedItem> {
        self.store
            .load_item(item)?
            .filter(|loaded| loaded.list_name == self.config.name)
            .ok_or(ScopedListError::ItemNotFound(item))
    }

    /// Items of one scope, first to last.
    pub fn list(&self, scope_key: Option<&str>) -> ScopedListResult<Vec<RankedItem>> {
        let scope = self.scope(scope_key)?;
        Ok(self.store.list_scope(&scope)?)
    }

    /// Rank for a new member at the top or bottom of `scope`.
    ///
    /// Read-only; the caller holds the scope lease.
    pub fn assign_on_insert(
        &self,
        scope: &ListScope,
        insert_at_bottom: bool,
    ) -> ScopedListResult<Rank> {
        let (first, last) = self.store.read_scope_boundaries(scope)?;
        let count = self.store.count_scope(scope)?;
        let rank = if insert_at_bottom {
            self.between(last.as_ref(), None, count)?
        } else {
            self.between(None, first.as_ref(), count)?
        };
        Ok(rank)
    }

    /// Rank placing `item` right after `after`. Read-only.
    pub fn place_after(&self, item: ItemId, after: ItemId) -> ScopedListResult<Rank> {
        let target = self.load_move_target(item, after)?;
        let previous = ranked(&target)?;
        let next = self.store.read_neighbor(after, Direction::After)?;
        let count = self.store.count_scope(&target.list_scope())?;
        self.between(Some(&previous), next.as_ref(), count)
    }

    /// Rank placing `item` right before `before`. Read-only.
    pub fn place_before(&self, item: ItemId, before: ItemId) -> ScopedListResult<Rank> {
        let target = self.load_move_target(item, before)?;
        let next = ranked(&target)?;
        let previous = self.store.read_neighbor(before, Direction::Before)?;
        let count = self.store.count_scope(&target.list_scope())?;
        self.between(previous.as_ref(), Some(&next), count)
    }

    /// Rank placing an existing `item` first in its scope. Read-only.
    pub fn place_on_top(&self, item: ItemId) -> ScopedListResult<Rank> {
        let scope = self.get(item)?.list_scope();
        self.assign_on_insert(&scope, false)
    }

    /// Rank placing an existing `item` last in its scope. Read-only.
    pub fn place_on_bottom(&self, item: ItemId) -> ScopedListResult<Rank> {
        let scope = self.get(item)?.list_scope();
        self.assign_on_insert(&scope, true)
    }

    /// Creates a ranked item in `scope_key`.
    ///
    /// `position = None` applies the list's `insert_to_bottom` policy.
    pub fn insert(
        &self,
        scope_key: Option<&str>,
        position: Option<InsertPosition>,
        label: &str,
    ) -> ScopedListResult<RankedItem> {
        let scope = self.scope(scope_key)?;
        let position = position.unwrap_or_else(|| self.default_position());

        let lease = self.store.acquire_scope_lock(&scope)?;
        let rank = self
            .assign_on_insert(&scope, position == InsertPosition::Bottom)
            .inspect_err(|err| log_place_error("insert", &scope, err))?;
        let item = self.store.insert_item(&scope, &rank, label)?;
        self.flag_if_rebalancing_needed(&scope)?;
        lease.commit()?;

        info!(
            "event=rank_place module=scoped_list status=ok op=insert scope={} position={:?} rank_len={}",
            scope,
            position,
            rank.len()
        );
        Ok(item)
    }

    /// Moves `item` right after `target`.
    pub fn move_after(&self, item: ItemId, target: ItemId) -> ScopedListResult<Rank> {
        self.commit_move(item, "move_after", || self.place_after(item, target))
    }

    /// Moves `item` right before `target`.
    pub fn move_before(&self, item: ItemId, target: ItemId) -> ScopedListResult<Rank> {
        self.commit_move(item, "move_before", || self.place_before(item, target))
    }

    pub fn move_to_top(&self, item: ItemId) -> ScopedListResult<Rank> {
        self.commit_move(item, "move_to_top", || self.place_on_top(item))
    }

    pub fn move_to_bottom(&self, item: ItemId) -> ScopedListResult<Rank> {
        self.commit_move(item, "move_to_bottom", || self.place_on_bottom(item))
    }

    /// Moves `item` into `new_scope_key` and re-places it there.
    ///
    /// The old rank is cleared first, then the insert path runs with the
    /// list's top/bottom policy. Returns the unchanged rank when the scope
    /// is unchanged.
    pub fn reassign_on_scope_change(
        &self,
        item: ItemId,
        new_scope_key: Option<&str>,
    ) -> ScopedListResult<Rank> {
        let new_scope = self.scope(new_scope_key)?;
        let lease = self.store.acquire_scope_lock(&new_scope)?;

        let current = self.get(item)?;
        if current.scope_key.as_deref() == new_scope.scope_key() {
            if let Some(rank) = &current.rank {
                return Ok(rank.clone());
            }
        }

        self.store.move_item_to_scope(item, &new_scope)?;
        let rank = self
            .assign_on_insert(&new_scope, self.config.insert_to_bottom)
            .inspect_err(|err| log_place_error("reassign_scope", &new_scope, err))?;
        self.store.write_rank(item, &rank)?;
        self.flag_if_rebalancing_needed(&new_scope)?;
        lease.commit()?;

        info!(
            "event=rank_place module=scoped_list status=ok op=reassign_scope item={} from={} to={} rank_len={}",
            item,
            current.list_scope(),
            new_scope,
            rank.len()
        );
        Ok(rank)
    }

    /// Whether any rank in the scope reached `rebalancing_length`.
    pub fn needs_rebalancing(&self, scope_key: Option<&str>) -> ScopedListResult<bool> {
        let scope = self.scope(scope_key)?;
        self.scope_needs_rebalancing(&scope)
    }

    /// Whether a rebalance marker is pending for the scope.
    pub fn rebalancing_scheduled(&self, scope_key: Option<&str>) -> ScopedListResult<bool> {
        let scope = self.scope(scope_key)?;
        Ok(self.schedule.is_scheduled(&scope)?)
    }

    /// Re-spaces every rank in the scope and clears its marker.
    ///
    /// Holds the scope lease for the whole read-modify-write. Returns the
    /// number of re-ranked items.
    pub fn rebalance_scope(&self, scope_key: Option<&str>) -> ScopedListResult<usize> {
        let scope = self.scope(scope_key)?;
        let lease = self.store.acquire_scope_lock(&scope)?;

        let members = self.store.read_scope_members_ordered(&scope)?;
        let count = members.len() as u64;
        let default_length = self.config.rank.default_rank_length;
        let ranks = self.engine.rebalance(members, count, default_length)?;
        self.store.write_ranks_batch(&ranks)?;
        self.schedule.clear(&scope)?;
        lease.commit()?;

        info!(
            "event=rebalance module=scoped_list status=ok scope={} items={} rank_len={}",
            scope,
            ranks.len(),
            self.arithmetic.rank_length(count, default_length)
        );
        Ok(ranks.len())
    }

    fn between(
        &self,
        previous: Option<&Rank>,
        next: Option<&Rank>,
        count: u64,
    ) -> ScopedListResult<Rank> {
        let rank = self.arithmetic.between(
            previous,
            next,
            count,
            self.config.rank.default_rank_length,
            false,
        )?;
        Ok(rank)
    }

    fn commit_move(
        &self,
        item: ItemId,
        operation: &'static str,
        place: impl FnOnce() -> ScopedListResult<Rank>,
    ) -> ScopedListResult<Rank> {
        let scope = self.get(item)?.list_scope();
        let lease = self.store.acquire_scope_lock(&scope)?;
        if self.get(item)?.list_scope() != scope {
            return Err(ScopedListError::ScopeChanged(item));
        }

        let rank = place().inspect_err(|err| log_place_error(operation, &scope, err))?;
        self.store.write_rank(item, &rank)?;
        self.flag_if_rebalancing_needed(&scope)?;
        lease.commit()?;

        info!(
            "event=rank_place module=scoped_list status=ok op={} scope={} rank_len={}",
            operation,
            scope,
            rank.len()
        );
        Ok(rank)
    }

    /// Item and target must both belong to this list and share a scope.
    fn load_move_target(&self, item: ItemId, target: ItemId) -> ScopedListResult<RankedItem> {
        let moving = self.get(item)?;
        let target_item = self.get(target)?;
        if moving.scope_key != target_item.scope_key {
            return Err(ScopedListError::ScopeMismatch { item, target });
        }
        Ok(target_item)
    }

    fn scope_needs_rebalancing(&self, scope: &ListScope) -> ScopedListResult<bool> {
        Ok(self
            .store
            .has_rank_length_at_least(scope, self.config.rank.rebalancing_length)?)
    }

    fn flag_if_rebalancing_needed(&self, scope: &ListScope) -> ScopedListResult<()> {
        if !self.scope_needs_rebalancing(scope)? {
            return Ok(());
        }
        if self.schedule.schedule(scope)? {
            warn!(
                "event=rebalance_scheduled module=scoped_list status=ok scope={} threshold={}",
                scope, self.config.rank.rebalancing_length
            );
        }
        Ok(())
    }
}

fn ranked(item: &RankedItem) -> ScopedListResult<Rank> {
    item.rank
        .clone()
        .ok_or(ScopedListError::Unranked(item.item_uuid))
}

fn log_place_error(operation: &str, scope: &ListScope, err: &ScopedListError) {
    warn!(
        "event=rank_place module=scoped_list status=error op={} scope={} error={}",
        operation, scope, err
    );
}
