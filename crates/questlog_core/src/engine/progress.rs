//! Task lifecycle operations on a single profile.
//!
//! # Responsibility
//! - Turn raw form input into validated tasks.
//! - Complete, delete and redeem against one in-memory profile, routing XP
//!   and coins through the leveling engine.
//!
//! # Invariants
//! - Rejected input leaves the profile untouched.
//! - Completing a task credits its rewards exactly once and bumps the
//!   lifetime counter exactly once.
//! - Deleting a task never lowers the lifetime counter.

use crate::engine::leveling::{add_coins, add_xp, spend_coins};
use crate::model::profile::Profile;
use crate::model::task::{Difficulty, Task, TaskValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raw task form input as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub description: String,
    pub xp_reward: String,
    pub coin_reward: String,
    pub difficulty: Difficulty,
}

impl TaskDraft {
    /// Draft with the form defaults: 50 XP, 20 coins, easy.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            xp_reward: "50".to_string(),
            coin_reward: "20".to_string(),
            difficulty: Difficulty::Easy,
        }
    }

    pub fn with_rewards(mut self, xp_reward: impl Into<String>, coin_reward: impl Into<String>) -> Self {
        self.xp_reward = xp_reward.into();
        self.coin_reward = coin_reward.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Validates the draft into an open task.
    pub fn parse(&self) -> Result<Task, TaskInputError> {
        let xp_reward = parse_reward(&self.xp_reward)
            .ok_or_else(|| TaskInputError::InvalidXpReward(self.xp_reward.clone()))?;
        let coin_reward = parse_reward(&self.coin_reward)
            .ok_or_else(|| TaskInputError::InvalidCoinReward(self.coin_reward.clone()))?;
        Task::new(self.description.as_str(), self.difficulty, xp_reward, coin_reward)
            .map_err(TaskInputError::from)
    }
}

fn parse_reward(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok()
}

/// User-input validation errors for task creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInputError {
    EmptyDescription,
    InvalidXpReward(String),
    InvalidCoinReward(String),
}

impl Display for TaskInputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDescription => write!(f, "task description must not be blank"),
            Self::InvalidXpReward(value) => {
                write!(f, "XP reward must be a non-negative whole number, got `{value}`")
            }
            Self::InvalidCoinReward(value) => {
                write!(f, "coin reward must be a non-negative whole number, got `{value}`")
            }
        }
    }
}

impl Error for TaskInputError {}

impl From<TaskValidationError> for TaskInputError {
    fn from(value: TaskValidationError) -> Self {
        match value {
            TaskValidationError::EmptyDescription
            | TaskValidationError::CompletionTimeWithoutCompletion => Self::EmptyDescription,
        }
    }
}

/// Errors for operations addressing a task by list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    TaskIndexOutOfRange { index: usize, len: usize },
    TaskAlreadyCompleted(usize),
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskIndexOutOfRange { index, len } => {
                write!(f, "task index {index} out of range for {len} tasks")
            }
            Self::TaskAlreadyCompleted(index) => write!(f, "task #{index} is already completed"),
        }
    }
}

impl Error for ProgressError {}

/// What a completion credited to the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReward {
    pub xp: u64,
    pub coins: u64,
    pub levels_gained: u32,
}

/// Appends a parsed draft to the profile. Returns the new task's index.
pub fn add_task(profile: &mut Profile, draft: &TaskDraft) -> Result<usize, TaskInputError> {
    let task = draft.parse()?;
    profile.tasks.push(task);
    Ok(profile.tasks.len() - 1)
}

/// Completes the task at `index` and credits its rewards.
pub fn complete_task(
    profile: &mut Profile,
    index: usize,
) -> Result<CompletionReward, ProgressError> {
    let len = profile.tasks.len();
    let task = profile
        .tasks
        .get_mut(index)
        .ok_or(ProgressError::TaskIndexOutOfRange { index, len })?;
    if !task.complete() {
        return Err(ProgressError::TaskAlreadyCompleted(index));
    }
    let xp = u64::from(task.xp_reward);
    let coins = u64::from(task.coin_reward);

    let levels_gained = add_xp(profile, xp);
    add_coins(profile, coins);
    profile.total_completed_tasks = profile.total_completed_tasks.saturating_add(1);

    Ok(CompletionReward {
        xp,
        coins,
        levels_gained,
    })
}

/// Removes and returns the task at `index`.
pub fn delete_task(profile: &mut Profile, index: usize) -> Result<Task, ProgressError> {
    let len = profile.tasks.len();
    if index >= len {
        return Err(ProgressError::TaskIndexOutOfRange { index, len });
    }
    Ok(profile.tasks.remove(index))
}

/// A coin-priced break reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub name: &'static str,
    pub cost: u64,
}

const REWARD_CATALOG: [Reward; 4] = [
    Reward {
        name: "NETFLIX 30 MINS",
        cost: 150,
    },
    Reward {
        name: "VIDEO GAMES",
        cost: 250,
    },
    Reward {
        name: "GO OUT",
        cost: 150,
    },
    Reward {
        name: "1 HOUR BREAK",
        cost: 300,
    },
];

impl Reward {
    /// Built-in break rewards.
    pub fn catalog() -> &'static [Reward] {
        &REWARD_CATALOG
    }

    pub fn find(name: &str) -> Option<Reward> {
        REWARD_CATALOG
            .iter()
            .copied()
            .find(|reward| reward.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Pays for `reward`. `false` means insufficient coins; nothing changed.
pub fn redeem_reward(profile: &mut Profile, reward: &Reward) -> bool {
    spend_coins(profile, reward.cost)
}

#[cfg(test)]
mod tests {
    use super::{add_task, complete_task, delete_task, ProgressError, TaskDraft, TaskInputError};
    use crate::model::profile::Profile;
    use crate::model::task::Difficulty;

    #[test]
    fn draft_rejects_non_numeric_and_negative_rewards() {
        let draft = TaskDraft::new("flashcards").with_rewards("ten", "5");
        assert_eq!(
            draft.parse().unwrap_err(),
            TaskInputError::InvalidXpReward("ten".to_string())
        );

        let draft = TaskDraft::new("flashcards").with_rewards("10", "-5");
        assert_eq!(
            draft.parse().unwrap_err(),
            TaskInputError::InvalidCoinReward("-5".to_string())
        );

        let draft = TaskDraft::new("  ");
        assert_eq!(draft.parse().unwrap_err(), TaskInputError::EmptyDescription);
    }

    #[test]
    fn rejected_draft_leaves_profile_unchanged() {
        let mut profile = Profile::new("ada").unwrap();
        let before = profile.clone();
        assert!(add_task(&mut profile, &TaskDraft::new("x").with_rewards("1.5", "0")).is_err());
        assert_eq!(profile, before);
    }

    #[test]
    fn completing_twice_credits_once() {
        let mut profile = Profile::new("ada").unwrap();
        let draft = TaskDraft::new("lab report")
            .with_rewards("120", "15")
            .with_difficulty(Difficulty::Hard);
        let index = add_task(&mut profile, &draft).unwrap();

        let reward = complete_task(&mut profile, index).unwrap();
        assert_eq!(reward.levels_gained, 1);
        assert_eq!(profile.level(), 2);
        assert_eq!(profile.xp(), 20);
        assert_eq!(profile.coins(), 15 + 50);
        assert_eq!(profile.total_completed_tasks(), 1);

        let err = complete_task(&mut profile, index).unwrap_err();
        assert_eq!(err, ProgressError::TaskAlreadyCompleted(index));
        assert_eq!(profile.total_completed_tasks(), 1);
    }

    #[test]
    fn deleting_completed_task_keeps_lifetime_counter() {
        let mut profile = Profile::new("ada").unwrap();
        add_task(&mut profile, &TaskDraft::new("quiz")).unwrap();
        complete_task(&mut profile, 0).unwrap();

        delete_task(&mut profile, 0).unwrap();
        assert!(profile.tasks().is_empty());
        assert_eq!(profile.total_completed_tasks(), 1);
        assert!(matches!(
            delete_task(&mut profile, 0),
            Err(ProgressError::TaskIndexOutOfRange { index: 0, len: 0 })
        ));
    }
}
