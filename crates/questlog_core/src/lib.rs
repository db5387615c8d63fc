//! Core progression logic for QuestLog.
//! This crate owns leveling, task selection and study-session
//! reconciliation; hosts only render and forward user events.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use engine::leveling::{add_coins, add_xp, lifetime_xp, spend_coins, xp_needed};
pub use engine::progress::{CompletionReward, ProgressError, Reward, TaskDraft, TaskInputError};
pub use engine::selector::{effort_budget, effort_of, prioritize, select_optimal_tasks, TaskSelection};
pub use engine::stats::{progress_stats, ProgressStats};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::leaderboard::LeaderboardEntry;
pub use model::profile::{Profile, ProfileValidationError, Revision};
pub use model::task::{Difficulty, Task, TaskValidationError};
pub use repo::leaderboard_repo::{
    publish_best_effort, LeaderboardPublisher, PublishError, SqliteLeaderboard,
};
pub use repo::profile_repo::{ProfileRepository, RepoError, RepoResult, SqliteProfileRepository};
pub use service::profile_service::{ProfileService, ProfileServiceError};
pub use service::session_service::{
    MergeOutcome, MergeSummary, ParticipantOutcome, SessionBaseline, SessionDelta, SessionError,
    SessionHost, StudySession,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
