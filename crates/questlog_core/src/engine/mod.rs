//! Pure progression engines.
//!
//! # Responsibility
//! - `leveling`: XP → level/coin state transitions.
//! - `selector`: task ranking and effort-budgeted selection.
//! - `progress`: task lifecycle operations on one profile.
//! - `stats`: read-only progress summaries.
//!
//! # Invariants
//! - Engines never touch storage, logging sinks or global state; callers
//!   own persistence.

pub mod leveling;
pub mod progress;
pub mod selector;
pub mod stats;
