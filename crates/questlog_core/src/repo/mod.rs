//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the persistence and leaderboard contracts used by services.
//! - Isolate SQLite query details from progression logic.
//!
//! # Invariants
//! - Profile writes validate before touching storage.
//! - Profile saves are optimistic: a stale `revision` is a `Conflict`, never
//!   a silent overwrite.

pub mod leaderboard_repo;
pub mod profile_repo;
