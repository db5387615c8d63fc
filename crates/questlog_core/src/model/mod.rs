//! Domain model for profiles and their tasks.
//!
//! # Responsibility
//! - Define the canonical `Profile` and `Task` values shared by engines,
//!   repositories and services.
//! - Enforce construction-time invariants (non-blank names, monotonic
//!   completion).
//!
//! # Invariants
//! - A profile is identified by its `username`; tasks carry no surrogate id
//!   and are matched across snapshots by `description`.
//! - Tasks are plain values; copying between profiles never aliases.

pub mod leaderboard;
pub mod profile;
pub mod task;
