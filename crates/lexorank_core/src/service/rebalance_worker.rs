//! Deferred rebalancing consumer.
//!
//! # Responsibility
//! - Keep the registry of lists whose markers this process may drain.
//! - Rebalance every pending scope and clear its marker.
//!
//! # Invariants
//! - A marker is cleared only by a successful rebalance of its scope.
//! - One failing scope never stops the remaining markers from draining.

use crate::config::ListConfig;
use crate::model::ranked_item::ListScope;
use crate::repo::rank_repo::{RankStore, RankStoreError};
use crate::repo::schedule_repo::ScheduleStore;
use crate::service::scoped_list::{ScopedList, ScopedListError};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Worker registration and draining errors.
#[derive(Debug)]
pub enum RebalanceWorkerError {
    DuplicateList(String),
    /// A marker names a list this worker does not know.
    ListNotRegistered(String),
    List(ScopedListError),
    Store(RankStoreError),
}

impl Display for RebalanceWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateList(name) => write!(f, "list already registered: {name}"),
            Self::ListNotRegistered(name) => write!(f, "list not registered: {name}"),
            Self::List(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RebalanceWorkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::List(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScopedListError> for RebalanceWorkerError {
    fn from(value: ScopedListError) -> Self {
        Self::List(value)
    }
}

impl From<RankStoreError> for RebalanceWorkerError {
    fn from(value: RankStoreError) -> Self {
        Self::Store(value)
    }
}

/// One successfully rebalanced scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalancedScope {
    pub scope: ListScope,
    pub items: usize,
}

/// One scope left pending.
#[derive(Debug)]
pub struct RebalanceFailure {
    pub scope: ListScope,
    pub error: RebalanceWorkerError,
}

/// Outcome of one `run_pending` pass.
#[derive(Debug, Default)]
pub struct RebalanceReport {
    pub rebalanced: Vec<RebalancedScope>,
    pub failed: Vec<RebalanceFailure>,
}

impl RebalanceReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drains rebalance markers for registered lists.
pub struct RebalanceWorker<R: RankStore + Clone, Q: ScheduleStore + Clone> {
    store: R,
    schedule: Q,
    lists: BTreeMap<String, ScopedList<R, Q>>,
}

impl<R: RankStore + Clone, Q: ScheduleStore + Clone> RebalanceWorker<R, Q> {
    pub fn new(store: R, schedule: Q) -> Self {
        Self {
            store,
            schedule,
            lists: BTreeMap::new(),
        }
    }

    /// Registers one list configuration.
    pub fn register(&mut self, config: ListConfig) -> Result<(), RebalanceWorkerError> {
        if self.lists.contains_key(config.name.as_str()) {
            return Err(RebalanceWorkerError::DuplicateList(config.name));
        }
        let name = config.name.clone();
        let list = ScopedList::new(config, self.store.clone(), self.schedule.clone())?;
        self.lists.insert(name, list);
        Ok(())
    }

    /// Sorted registered list names.
    pub fn list_names(&self) -> Vec<String> {
        self.lists.keys().cloned().collect()
    }

    pub fn list(&self, name: &str) -> Option<&ScopedList<R, Q>> {
        self.lists.get(name)
    }

    /// Rebalances up to `limit` pending scopes, oldest marker first.
    ///
    /// # Errors
    /// - Only when the pending markers cannot be read; per-scope failures
    ///   are reported in [`RebalanceReport::failed`].
    pub fn run_pending(&self, limit: Option<u32>) -> Result<RebalanceReport, RebalanceWorkerError> {
        let markers = self.schedule.pending(limit)?;
        info!(
            "event=rebalance_drain module=rebalance_worker status=start pending={}",
            markers.len()
        );

        let mut report = RebalanceReport::default();
        for marker in markers {
            let scope = marker.scope;
            match self.rebalance_one(&scope) {
                Ok(items) => report.rebalanced.push(RebalancedScope { scope, items }),
                Err(error) => {
                    warn!(
                        "event=rebalance_drain module=rebalance_worker status=error scope={} error={}",
                        scope, error
                    );
                    report.failed.push(RebalanceFailure { scope, error });
                }
            }
        }

        info!(
            "event=rebalance_drain module=rebalance_worker status=ok rebalanced={} failed={}",
            report.rebalanced.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn rebalance_one(&self, scope: &ListScope) -> Result<usize, RebalanceWorkerError> {
        let list = self
            .lists
            .get(scope.list.as_str())
            .ok_or_else(|| RebalanceWorkerError::ListNotRegistered(scope.list.clone()))?;
        Ok(list.rebalance_scope(scope.scope_key())?)
    }
}
