//! Profile repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and store whole profiles (header row plus ordered task rows).
//! - Detect concurrent writers through the `revision` column.
//!
//! # Invariants
//! - `save` writes the profile row and all task rows in one immediate
//!   transaction; a failure leaves the stored profile untouched.
//! - `revision == 0` inserts; any other revision must match the stored one.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::profile::{Profile, ProfileValidationError, Revision};
use crate::model::task::{Difficulty, Task};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for profile persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ProfileValidationError),
    Db(DbError),
    NotFound(String),
    /// Insert of a never-saved profile whose username is already stored.
    AlreadyExists(String),
    /// Stored revision moved since the caller loaded the profile.
    Conflict {
        username: String,
        expected: Revision,
        actual: Revision,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(username) => write!(f, "profile not found: {username}"),
            Self::AlreadyExists(username) => write!(f, "profile already exists: {username}"),
            Self::Conflict {
                username,
                expected,
                actual,
            } => write!(
                f,
                "profile `{username}` was modified concurrently (expected revision {expected}, found {actual})"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted profile data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProfileValidationError> for RepoError {
    fn from(value: ProfileValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable profile storage.
pub trait ProfileRepository {
    fn exists(&self, username: &str) -> RepoResult<bool>;
    /// Returns `None` when no profile is stored under `username`.
    fn load(&self, username: &str) -> RepoResult<Option<Profile>>;
    /// Persists `profile` and returns the revision now stored.
    fn save(&self, profile: &Profile) -> RepoResult<Revision>;
}

impl<T: ProfileRepository + ?Sized> ProfileRepository for &T {
    fn exists(&self, username: &str) -> RepoResult<bool> {
        (**self).exists(username)
    }

    fn load(&self, username: &str) -> RepoResult<Option<Profile>> {
        (**self).load(username)
    }

    fn save(&self, profile: &Profile) -> RepoResult<Revision> {
        (**self).save(profile)
    }
}

/// SQLite-backed profile repository.
#[derive(Clone, Copy)]
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    /// Wraps a connection returned by `db::open_db*` (migrations applied).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// All stored usernames in ascending order.
    pub fn list_usernames(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT username FROM profiles ORDER BY username ASC;")?;
        let usernames = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usernames)
    }

    /// Deletes a profile and, through the foreign key, its tasks.
    pub fn delete_profile(&self, username: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM profiles WHERE username = ?1;", [username])?;
        if changed == 0 {
            return Err(RepoError::NotFound(username.to_string()));
        }
        Ok(())
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn exists(&self, username: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn load(&self, username: &str) -> RepoResult<Option<Profile>> {
        let header = self
            .conn
            .query_row(
                "SELECT username, xp, level, coins, total_completed_tasks, revision
                 FROM profiles
                 WHERE username = ?1;",
                [username],
                |row| {
                    Ok((
                        row.get::<_, String>("username")?,
                        row.get::<_, i64>("xp")?,
                        row.get::<_, i64>("level")?,
                        row.get::<_, i64>("coins")?,
                        row.get::<_, i64>("total_completed_tasks")?,
                        row.get::<_, i64>("revision")?,
                    ))
                },
            )
            .optional()?;

        let Some((stored_name, xp, level, coins, total_completed, revision)) = header else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT description, difficulty, xp_reward, coin_reward, completed, completed_at
             FROM profile_tasks
             WHERE username = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([username])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        let profile = Profile {
            username: stored_name,
            xp: from_db_int(xp, "profiles.xp")?,
            level: u32::try_from(level).map_err(|_| {
                RepoError::InvalidData(format!("invalid level value `{level}` in profiles.level"))
            })?,
            coins: from_db_int(coins, "profiles.coins")?,
            tasks,
            total_completed_tasks: from_db_int(total_completed, "profiles.total_completed_tasks")?,
            revision: from_db_int(revision, "profiles.revision")?,
        };
        profile
            .validate()
            .map_err(|err| RepoError::InvalidData(format!("profile `{username}`: {err}")))?;
        Ok(Some(profile))
    }

    fn save(&self, profile: &Profile) -> RepoResult<Revision> {
        profile.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let username = profile.username();
        let xp = to_db_int(profile.xp(), "xp")?;
        let coins = to_db_int(profile.coins(), "coins")?;
        let total_completed = to_db_int(profile.total_completed_tasks(), "total_completed_tasks")?;

        let saved_revision = if profile.is_unsaved() {
            if stored_revision(&tx, username)?.is_some() {
                return Err(RepoError::AlreadyExists(username.to_string()));
            }
            tx.execute(
                "INSERT INTO profiles (username, xp, level, coins, total_completed_tasks, revision)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1);",
                params![username, xp, profile.level(), coins, total_completed],
            )?;
            1
        } else {
            let expected = profile.revision();
            let next = expected.saturating_add(1);
            let changed = tx.execute(
                "UPDATE profiles
                 SET
                    xp = ?1,
                    level = ?2,
                    coins = ?3,
                    total_completed_tasks = ?4,
                    revision = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE username = ?6 AND revision = ?7;",
                params![
                    xp,
                    profile.level(),
                    coins,
                    total_completed,
                    to_db_int(next, "revision")?,
                    username,
                    to_db_int(expected, "revision")?,
                ],
            )?;
            if changed == 0 {
                return Err(match stored_revision(&tx, username)? {
                    None => RepoError::NotFound(username.to_string()),
                    Some(actual) => {
                        warn!(
                            "event=profile_save module=repo status=conflict username={} expected_revision={} actual_revision={}",
                            username, expected, actual
                        );
                        RepoError::Conflict {
                            username: username.to_string(),
                            expected,
                            actual,
                        }
                    }
                });
            }
            next
        };

        tx.execute("DELETE FROM profile_tasks WHERE username = ?1;", [username])?;
        for (position, task) in profile.tasks().iter().enumerate() {
            tx.execute(
                "INSERT INTO profile_tasks (
                    username,
                    position,
                    description,
                    difficulty,
                    xp_reward,
                    coin_reward,
                    completed,
                    completed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    username,
                    to_db_int(position as u64, "position")?,
                    task.description.as_str(),
                    task.difficulty.as_str(),
                    task.xp_reward,
                    task.coin_reward,
                    bool_to_int(task.is_completed()),
                    task.completed_at(),
                ],
            )?;
        }
        tx.commit()?;

        debug!(
            "event=profile_save module=repo status=ok username={} revision={} task_count={}",
            username,
            saved_revision,
            profile.tasks().len()
        );
        Ok(saved_revision)
    }
}

fn stored_revision(tx: &Transaction<'_>, username: &str) -> RepoResult<Option<Revision>> {
    let revision = tx
        .query_row(
            "SELECT revision FROM profiles WHERE username = ?1;",
            [username],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    revision
        .map(|value| from_db_int(value, "profiles.revision"))
        .transpose()
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let description: String = row.get("description")?;

    let difficulty_text: String = row.get("difficulty")?;
    let difficulty = Difficulty::parse(&difficulty_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid difficulty `{difficulty_text}` in profile_tasks.difficulty"
        ))
    })?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in profile_tasks.completed"
            )));
        }
    };

    Task::restore(
        description,
        difficulty,
        row.get("xp_reward")?,
        row.get("coin_reward")?,
        completed,
        row.get("completed_at")?,
    )
    .map_err(|err| RepoError::InvalidData(format!("profile_tasks row: {err}")))
}

fn to_db_int(value: u64, column: &str) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("{column} value {value} exceeds storage range")))
}

fn from_db_int(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid negative value `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
