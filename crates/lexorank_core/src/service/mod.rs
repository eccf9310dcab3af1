//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rank arithmetic and repository calls into list operations.
//! - Keep CLI and embedding layers decoupled from storage details.

pub mod rebalance_worker;
pub mod scoped_list;
