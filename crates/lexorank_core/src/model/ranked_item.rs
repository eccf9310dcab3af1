//! Ranked item domain model.
//!
//! # Responsibility
//! - Define the persisted record carrying one rank inside one scope.
//! - Define scope addressing shared by repositories and services.
//!
//! # Invariants
//! - `item_uuid` is stable and never reused.
//! - `rank` is `None` only transiently, inside a held scope lease, between
//!   invalidation and reassignment.
//! - The global scope of a list is `scope == None`, never an empty string.

use crate::rank::Rank;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a ranked item.
pub type ItemId = Uuid;

/// One ordered list inside one entity type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListScope {
    /// Entity type / list name, e.g. `tasks`.
    pub list: String,
    /// Scope key, e.g. the board id; `None` is the list-wide scope.
    pub scope: Option<String>,
}

impl ListScope {
    pub fn new(list: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            list: list.into(),
            scope,
        }
    }

    /// List-wide scope.
    pub fn global(list: impl Into<String>) -> Self {
        Self::new(list, None)
    }

    pub fn scoped(list: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(list, Some(scope.into()))
    }

    pub fn scope_key(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl Display for ListScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}[{}]", self.list, scope),
            None => write!(f, "{}", self.list),
        }
    }
}

/// Neighbour lookup direction relative to an item's current rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Closest lower rank.
    Before,
    /// Closest higher rank.
    After,
}

/// Where a new or re-scoped item lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    Top,
    Bottom,
}

impl InsertPosition {
    pub fn from_bottom_flag(insert_to_bottom: bool) -> Self {
        if insert_to_bottom {
            Self::Bottom
        } else {
            Self::Top
        }
    }
}

/// Persisted ranked record.
///
/// The core reads only `rank` and scope membership; `label` is an opaque
/// caller payload kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub item_uuid: ItemId,
    pub list_name: String,
    pub scope_key: Option<String>,
    pub rank: Option<Rank>,
    pub label: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl RankedItem {
    /// Scope this item currently belongs to.
    pub fn list_scope(&self) -> ListScope {
        ListScope::new(self.list_name.clone(), self.scope_key.clone())
    }
}
