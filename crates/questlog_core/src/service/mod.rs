//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate engines, repositories and the leaderboard into the
//!   single-player and multiplayer-session flows.
//! - Keep hosts (CLI, UI shells) decoupled from storage details.

pub mod profile_service;
pub mod session_service;
