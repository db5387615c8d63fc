//! Profile domain model.
//!
//! # Responsibility
//! - Hold one user's progression state: XP, level, coins, tasks and the
//!   lifetime completion counter.
//!
//! # Invariants
//! - `username` is trimmed and never blank.
//! - `level >= 1` and `xp < xp_needed(level)`.
//! - `total_completed_tasks` only grows; deleting a task never lowers it.
//! - `revision == 0` means "never persisted".
//!
//! State-changing operations live in `crate::engine`; this type only exposes
//! read access outside the crate.

use crate::engine::leveling::xp_needed;
use crate::model::task::{Task, TaskValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Persistence concurrency token. Bumped on every successful save.
pub type Revision = u64;

/// Validation errors for profile values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    EmptyUsername,
    LevelBelowOne,
    /// Stored XP already reaches the next level threshold.
    XpAboveThreshold {
        xp: u64,
        level: u32,
        needed: u64,
    },
    Task {
        position: usize,
        error: TaskValidationError,
    },
}

impl Display for ProfileValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be blank"),
            Self::LevelBelowOne => write!(f, "level must be at least 1"),
            Self::XpAboveThreshold { xp, level, needed } => write!(
                f,
                "xp {xp} at level {level} must be below the level threshold {needed}"
            ),
            Self::Task { position, error } => write!(f, "task #{position}: {error}"),
        }
    }
}

impl Error for ProfileValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Task { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A user's durable progression record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileRecord")]
pub struct Profile {
    pub(crate) username: String,
    pub(crate) xp: u64,
    pub(crate) level: u32,
    pub(crate) coins: u64,
    pub(crate) tasks: Vec<Task>,
    pub(crate) total_completed_tasks: u64,
    pub(crate) revision: Revision,
}

#[derive(Deserialize)]
struct ProfileRecord {
    username: String,
    xp: u64,
    level: u32,
    coins: u64,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    total_completed_tasks: u64,
    #[serde(default)]
    revision: Revision,
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ProfileValidationError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        let profile = Profile {
            username: record.username,
            xp: record.xp,
            level: record.level,
            coins: record.coins,
            tasks: record.tasks,
            total_completed_tasks: record.total_completed_tasks,
            revision: record.revision,
        };
        profile.validate()?;
        Ok(profile)
    }
}

impl Profile {
    /// Creates a fresh level-1 profile with no XP, coins or tasks.
    pub fn new(username: impl Into<String>) -> Result<Self, ProfileValidationError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(ProfileValidationError::EmptyUsername);
        }
        Ok(Self {
            username,
            xp: 0,
            level: 1,
            coins: 0,
            tasks: Vec::new(),
            total_completed_tasks: 0,
            revision: 0,
        })
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.username.trim().is_empty() {
            return Err(ProfileValidationError::EmptyUsername);
        }
        if self.level < 1 {
            return Err(ProfileValidationError::LevelBelowOne);
        }
        let needed = xp_needed(self.level);
        if self.xp >= needed {
            return Err(ProfileValidationError::XpAboveThreshold {
                xp: self.xp,
                level: self.level,
                needed,
            });
        }
        for (position, task) in self.tasks.iter().enumerate() {
            task.validate()
                .map_err(|error| ProfileValidationError::Task { position, error })?;
        }
        Ok(())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// XP accumulated toward the next level.
    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn coins(&self) -> u64 {
        self.coins
    }

    /// Tasks in display order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Lifetime completion counter, independent of the live task list.
    pub fn total_completed_tasks(&self) -> u64 {
        self.total_completed_tasks
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Whether this profile has never been written to storage.
    pub fn is_unsaved(&self) -> bool {
        self.revision == 0
    }

    /// Records the revision assigned by a successful save.
    pub fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }

    /// Number of completed tasks currently in the live list.
    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_completed()).count()
    }

    /// Finds the first task with the given description.
    pub fn find_task(&self, description: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.description == description)
    }
}
