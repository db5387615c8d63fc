//! Leaderboard publishing contract and a local SQLite ranking store.
//!
//! # Invariants
//! - One row per username; publishing replaces the previous row.
//! - Publishing is best effort for callers: a failure is logged and never
//!   rolls back the profile change that triggered it.

use crate::db::DbError;
use crate::model::leaderboard::LeaderboardEntry;
use crate::model::profile::Profile;
use log::{debug, warn};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

const LEADERBOARD_LIMIT_MAX: u32 = 100;

#[derive(Debug)]
pub enum PublishError {
    Db(DbError),
    /// Transport-level rejection from a remote ranking service.
    Rejected(String),
    /// Stored ranking row violates the entry invariants.
    InvalidData(String),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Rejected(reason) => write!(f, "leaderboard rejected entry: {reason}"),
            Self::InvalidData(message) => write!(f, "invalid leaderboard data: {message}"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Rejected(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<rusqlite::Error> for PublishError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Sink for ranking updates.
pub trait LeaderboardPublisher {
    fn publish(&self, entry: &LeaderboardEntry) -> Result<(), PublishError>;
}

impl<T: LeaderboardPublisher + ?Sized> LeaderboardPublisher for &T {
    fn publish(&self, entry: &LeaderboardEntry) -> Result<(), PublishError> {
        (**self).publish(entry)
    }
}

/// Publishes `profile` and logs, rather than returns, any failure.
///
/// Returns whether the entry was accepted.
pub fn publish_best_effort<P: LeaderboardPublisher + ?Sized>(publisher: &P, profile: &Profile) -> bool {
    let entry = LeaderboardEntry::from_profile(profile);
    match publisher.publish(&entry) {
        Ok(()) => {
            debug!(
                "event=leaderboard_publish module=repo status=ok username={} level={} xp={} completed={}",
                entry.username, entry.level, entry.xp, entry.total_completed_tasks
            );
            true
        }
        Err(err) => {
            warn!(
                "event=leaderboard_publish module=repo status=error username={} error={}",
                entry.username, err
            );
            false
        }
    }
}

/// Leaderboard stored next to profiles in the local database.
#[derive(Clone, Copy)]
pub struct SqliteLeaderboard<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLeaderboard<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Highest-ranked entries: level, then xp, then lifetime completions.
    ///
    /// `limit` is clamped to 1..=100.
    pub fn top_entries(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, PublishError> {
        let limit = limit.clamp(1, LEADERBOARD_LIMIT_MAX);
        let mut stmt = self.conn.prepare(
            "SELECT username, level, xp, total_completed_tasks
             FROM leaderboard
             ORDER BY level DESC, xp DESC, total_completed_tasks DESC, username ASC
             LIMIT ?1;",
        )?;
        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(username, level, xp, completed)| -> Result<LeaderboardEntry, PublishError> {
                let level = u32::try_from(level)
                    .ok()
                    .filter(|level| *level >= 1)
                    .ok_or_else(|| {
                        PublishError::InvalidData(format!(
                            "invalid level value `{level}` for `{username}`"
                        ))
                    })?;
                Ok(LeaderboardEntry {
                    xp: stored_count(xp, "xp", &username)?,
                    total_completed_tasks: stored_count(completed, "total_completed_tasks", &username)?,
                    username,
                    level,
                })
            })
            .collect()
    }
}

impl LeaderboardPublisher for SqliteLeaderboard<'_> {
    fn publish(&self, entry: &LeaderboardEntry) -> Result<(), PublishError> {
        let xp = i64::try_from(entry.xp)
            .map_err(|_| PublishError::Rejected(format!("xp {} out of range", entry.xp)))?;
        let completed = i64::try_from(entry.total_completed_tasks).map_err(|_| {
            PublishError::Rejected(format!(
                "completed count {} out of range",
                entry.total_completed_tasks
            ))
        })?;
        self.conn.execute(
            "INSERT INTO leaderboard (username, level, xp, total_completed_tasks)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(username) DO UPDATE SET
                level = excluded.level,
                xp = excluded.xp,
                total_completed_tasks = excluded.total_completed_tasks,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![entry.username, entry.level, xp, completed],
        )?;
        Ok(())
    }
}

fn stored_count(value: i64, column: &str, username: &str) -> Result<u64, PublishError> {
    u64::try_from(value).map_err(|_| {
        PublishError::InvalidData(format!(
            "invalid negative value `{value}` in leaderboard.{column} for `{username}`"
        ))
    })
}
