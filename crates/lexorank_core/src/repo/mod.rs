//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence collaborators consumed by list services.
//! - Isolate SQLite query details from rank computation and orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`ItemNotFound`, `LockTimeout`)
//!   in addition to DB transport errors.
//! - Repositories never compute ranks; they only read and store them.

pub mod rank_repo;
pub mod schedule_repo;
mod schema;
