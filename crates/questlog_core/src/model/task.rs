//! Task domain model.
//!
//! # Invariants
//! - `description` is never blank.
//! - Completion is monotonic: once `completed` is true it never reverts.
//! - `completed_at` is set exactly once, on the first completion, and only
//!   when `completed` is true.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Effort class of a task. Always defined; there is no "unknown" class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Stable lowercase name used for storage and wire formats.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Parses a case-insensitive difficulty name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for task values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyDescription,
    /// `completed_at` present on a task that is not completed.
    CompletionTimeWithoutCompletion,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "task description must not be blank"),
            Self::CompletionTimeWithoutCompletion => {
                write!(f, "completed_at is set but task is not completed")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// A user-defined unit of work with XP and coin rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskRecord")]
pub struct Task {
    /// Merge identity across snapshots.
    pub description: String,
    pub difficulty: Difficulty,
    pub xp_reward: u32,
    pub coin_reward: u32,
    completed: bool,
    /// Unix epoch milliseconds of the first completion.
    completed_at: Option<i64>,
}

/// Unvalidated wire shape for `Task` deserialization.
#[derive(Deserialize)]
struct TaskRecord {
    description: String,
    difficulty: Difficulty,
    xp_reward: u32,
    coin_reward: u32,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<i64>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = TaskValidationError;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        Task::restore(
            record.description,
            record.difficulty,
            record.xp_reward,
            record.coin_reward,
            record.completed,
            record.completed_at,
        )
    }
}

impl Task {
    /// Creates an open task. The description is trimmed.
    pub fn new(
        description: impl Into<String>,
        difficulty: Difficulty,
        xp_reward: u32,
        coin_reward: u32,
    ) -> Result<Self, TaskValidationError> {
        let description = description.into().trim().to_string();
        let task = Self {
            description,
            difficulty,
            xp_reward,
            coin_reward,
            completed: false,
            completed_at: None,
        };
        task.validate()?;
        Ok(task)
    }

    /// Rebuilds a task from persisted state, validating it.
    ///
    /// Used by storage and import paths where completion already happened.
    pub fn restore(
        description: String,
        difficulty: Difficulty,
        xp_reward: u32,
        coin_reward: u32,
        completed: bool,
        completed_at: Option<i64>,
    ) -> Result<Self, TaskValidationError> {
        let task = Self {
            description,
            difficulty,
            xp_reward,
            coin_reward,
            completed,
            completed_at,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.description.trim().is_empty() {
            return Err(TaskValidationError::EmptyDescription);
        }
        if !self.completed && self.completed_at.is_some() {
            return Err(TaskValidationError::CompletionTimeWithoutCompletion);
        }
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn completed_at(&self) -> Option<i64> {
        self.completed_at
    }

    /// Combined reward used for ranking and selection.
    pub fn value(&self) -> u64 {
        u64::from(self.xp_reward) + u64::from(self.coin_reward)
    }

    /// Marks the task completed now. Returns `true` on the first transition.
    pub fn complete(&mut self) -> bool {
        self.complete_at(now_epoch_ms())
    }

    /// Marks the task completed at `at_ms`.
    ///
    /// Returns `false` and leaves the task untouched when it is already
    /// completed; the original completion time is kept.
    pub fn complete_at(&mut self, at_ms: i64) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        if self.completed_at.is_none() {
            self.completed_at = Some(at_ms);
        }
        true
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
