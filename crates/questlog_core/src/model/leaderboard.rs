//! Leaderboard projection of a profile.

use crate::model::profile::Profile;
use serde::Serialize;

/// Ranking row pushed after every state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub level: u32,
    pub xp: u64,
    /// Lifetime counter, not the live completed-task count.
    pub total_completed_tasks: u64,
}

impl LeaderboardEntry {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            username: profile.username().to_string(),
            level: profile.level(),
            xp: profile.xp(),
            total_completed_tasks: profile.total_completed_tasks(),
        }
    }
}
