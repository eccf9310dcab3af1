//! CLI argument definitions for the lexorank binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use lexorank_core::{InsertPosition, ItemId};

/// Insert position override
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Position {
    /// First in scope
    Top,
    /// Last in scope
    Bottom,
}

impl From<Position> for InsertPosition {
    fn from(value: Position) -> Self {
        match value {
            Position::Top => InsertPosition::Top,
            Position::Bottom => InsertPosition::Bottom,
        }
    }
}

/// Scoped lexicographic rank lists backed by SQLite
#[derive(Parser, Debug)]
#[command(name = "lexorank")]
#[command(version)]
pub struct Cli {
    /// SQLite database file, created and migrated on first use
    #[arg(short = 'D', long, default_value = "lexorank.db", env = "LEXORANK_DB")]
    pub db: PathBuf,

    /// List (entity type) to operate on
    #[arg(short, long, default_value = "items", env = "LEXORANK_LIST")]
    pub list: String,

    /// Require a scope key on every list operation
    #[arg(long)]
    pub scoped: bool,

    /// New and re-scoped items land at the bottom
    #[arg(long)]
    pub insert_to_bottom: bool,

    /// Absolute directory for rolling log files; stderr when absent
    #[arg(long, env = "LEXORANK_LOG_DIR")]
    pub log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "LEXORANK_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Insert a new item
    Insert {
        /// Caller payload shown by `list`
        label: String,
        #[arg(short, long)]
        scope: Option<String>,
        /// Overrides the list's insert policy
        #[arg(short, long)]
        position: Option<Position>,
    },
    /// Print a scope in rank order
    List {
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Move ITEM right before TARGET
    MoveBefore { item: ItemId, target: ItemId },
    /// Move ITEM right after TARGET
    MoveAfter { item: ItemId, target: ItemId },
    /// Move ITEM to the top of its scope
    Top { item: ItemId },
    /// Move ITEM to the bottom of its scope
    Bottom { item: ItemId },
    /// Move ITEM into another scope
    Rescope {
        item: ItemId,
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Rebalance one scope now
    Rebalance {
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Show rebalancing state of one scope
    Status {
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Rebalance every scope with a pending marker for this list
    Drain {
        /// Maximum markers to process
        #[arg(long)]
        limit: Option<u32>,
    },
}
