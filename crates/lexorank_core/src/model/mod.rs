//! Domain model for ranked lists.
//!
//! # Responsibility
//! - Define the records and addressing types shared by repositories and
//!   services.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId`.
//! - Every item belongs to exactly one `ListScope` at a time.

pub mod ranked_item;
