//! Scoped lexicographic ranking.
//!
//! Items of a list carry short string ranks whose plain string order is the
//! list order, so inserts and moves write a single row.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod rank;
pub mod repo;
pub mod service;

pub use config::{Alphabet, ConfigError, ListConfig, RankConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::ranked_item::{Direction, InsertPosition, ItemId, ListScope, RankedItem};
pub use rank::{Rank, RankArithmetic, RankCodec, RankError, RankResult, RebalanceEngine};
pub use repo::rank_repo::{
    RankStore, RankStoreError, RankStoreResult, ScopeLease, SqliteRankStore, SqliteScopeLease,
};
pub use repo::schedule_repo::{RebalanceMarker, ScheduleStore, SqliteScheduleStore};
pub use service::rebalance_worker::{
    RebalanceFailure, RebalanceReport, RebalanceWorker, RebalanceWorkerError, RebalancedScope,
};
pub use service::scoped_list::{ScopedList, ScopedListError, ScopedListResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
