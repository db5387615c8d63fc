//! Single-player profile use-case service.
//!
//! # Responsibility
//! - Sign-up/sign-in and profile import against the profile repository.
//! - Task add/complete/delete and reward redemption with persistence.
//! - Recommendation, study plan and statistics read paths.
//!
//! # Invariants
//! - Every mutation is applied to a copy, saved, and only then committed to
//!   the caller's profile; a failed save leaves the caller's value as it was.
//! - Leaderboard publishing never fails an operation.

use crate::engine::progress::{
    self, CompletionReward, ProgressError, Reward, TaskDraft, TaskInputError,
};
use crate::engine::selector::{prioritize, select_optimal_tasks, TaskSelection};
use crate::engine::stats::{progress_stats, ProgressStats};
use crate::model::profile::{Profile, ProfileValidationError};
use crate::model::task::Task;
use crate::repo::leaderboard_repo::{publish_best_effort, LeaderboardPublisher};
use crate::repo::profile_repo::{ProfileRepository, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProfileServiceError {
    InvalidUsername(ProfileValidationError),
    UsernameTaken(String),
    /// Missing or unreadable profile; callers must not fall back to a
    /// default profile.
    ProfileNotFound(String),
    Input(TaskInputError),
    Progress(ProgressError),
    Repo(RepoError),
}

impl Display for ProfileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUsername(err) => write!(f, "{err}"),
            Self::UsernameTaken(username) => write!(f, "username already taken: {username}"),
            Self::ProfileNotFound(username) => write!(f, "cannot load profile: {username}"),
            Self::Input(err) => write!(f, "{err}"),
            Self::Progress(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProfileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidUsername(err) => Some(err),
            Self::Input(err) => Some(err),
            Self::Progress(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::UsernameTaken(_) | Self::ProfileNotFound(_) => None,
        }
    }
}

impl From<RepoError> for ProfileServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(username) => Self::ProfileNotFound(username),
            RepoError::AlreadyExists(username) => Self::UsernameTaken(username),
            other => Self::Repo(other),
        }
    }
}

impl From<TaskInputError> for ProfileServiceError {
    fn from(value: TaskInputError) -> Self {
        Self::Input(value)
    }
}

impl From<ProgressError> for ProfileServiceError {
    fn from(value: ProgressError) -> Self {
        Self::Progress(value)
    }
}

pub type ServiceResult<T> = Result<T, ProfileServiceError>;

/// Single-player facade over a profile repository and a leaderboard.
pub struct ProfileService<R: ProfileRepository, P: LeaderboardPublisher> {
    repo: R,
    publisher: P,
}

impl<R: ProfileRepository, P: LeaderboardPublisher> ProfileService<R, P> {
    pub fn new(repo: R, publisher: P) -> Self {
        Self { repo, publisher }
    }

    /// Creates and stores a fresh level-1 profile.
    pub fn sign_up(&self, username: &str) -> ServiceResult<Profile> {
        let mut profile = Profile::new(username).map_err(ProfileServiceError::InvalidUsername)?;
        if self.repo.exists(profile.username())? {
            return Err(ProfileServiceError::UsernameTaken(profile.username().to_string()));
        }
        let revision = self.repo.save(&profile)?;
        profile.set_revision(revision);
        publish_best_effort(&self.publisher, &profile);
        info!(
            "event=profile_sign_up module=service status=ok username={}",
            profile.username()
        );
        Ok(profile)
    }

    /// Loads an existing profile.
    pub fn sign_in(&self, username: &str) -> ServiceResult<Profile> {
        let username = username.trim();
        let profile = self
            .repo
            .load(username)
            .map_err(|err| match err {
                RepoError::InvalidData(_) => ProfileServiceError::ProfileNotFound(username.to_string()),
                other => other.into(),
            })?
            .ok_or_else(|| ProfileServiceError::ProfileNotFound(username.to_string()))?;
        info!(
            "event=profile_sign_in module=service status=ok username={} level={}",
            profile.username(),
            profile.level()
        );
        Ok(profile)
    }

    /// Stores a profile document exported elsewhere as a new profile.
    ///
    /// The document's revision is ignored; an existing username is
    /// rejected rather than overwritten.
    pub fn import_profile(&self, mut profile: Profile) -> ServiceResult<Profile> {
        if self.repo.exists(profile.username())? {
            return Err(ProfileServiceError::UsernameTaken(profile.username().to_string()));
        }
        profile.set_revision(0);
        let revision = self.repo.save(&profile)?;
        profile.set_revision(revision);
        publish_best_effort(&self.publisher, &profile);
        info!(
            "event=profile_import module=service status=ok username={} level={} task_count={}",
            profile.username(),
            profile.level(),
            profile.tasks().len()
        );
        Ok(profile)
    }

    /// Parses and appends a task. Returns its index.
    pub fn add_task(&self, profile: &mut Profile, draft: &TaskDraft) -> ServiceResult<usize> {
        self.apply_and_save(profile, |next| progress::add_task(next, draft).map_err(Into::into))
    }

    /// Completes a task, credits its rewards and publishes the new ranking.
    pub fn complete_task(&self, profile: &mut Profile, index: usize) -> ServiceResult<CompletionReward> {
        let reward =
            self.apply_and_save(profile, |next| progress::complete_task(next, index).map_err(Into::into))?;
        publish_best_effort(&self.publisher, profile);
        info!(
            "event=task_complete module=service status=ok username={} xp={} coins={} levels_gained={}",
            profile.username(),
            reward.xp,
            reward.coins,
            reward.levels_gained
        );
        Ok(reward)
    }

    /// Removes a task; the lifetime completion counter is kept.
    pub fn delete_task(&self, profile: &mut Profile, index: usize) -> ServiceResult<Task> {
        self.apply_and_save(profile, |next| progress::delete_task(next, index).map_err(Into::into))
    }

    /// Spends coins on `reward`.
    ///
    /// `Ok(false)` means insufficient coins; nothing is written.
    pub fn redeem_reward(&self, profile: &mut Profile, reward: &Reward) -> ServiceResult<bool> {
        let mut next = profile.clone();
        if !progress::redeem_reward(&mut next, reward) {
            return Ok(false);
        }
        let revision = self.repo.save(&next)?;
        next.set_revision(revision);
        *profile = next;
        info!(
            "event=reward_redeem module=service status=ok username={} cost={}",
            profile.username(),
            reward.cost
        );
        Ok(true)
    }

    /// Open tasks, highest combined reward first.
    pub fn recommendations<'a>(&self, profile: &'a Profile) -> Vec<&'a Task> {
        prioritize(profile.tasks())
    }

    /// Best set of open tasks that fits the effort budget of the profile's
    /// level.
    pub fn study_plan<'a>(&self, profile: &'a Profile) -> TaskSelection<'a> {
        select_optimal_tasks(
            profile.tasks().iter().filter(|task| !task.is_completed()),
            profile.level(),
        )
    }

    pub fn progress_stats(&self, profile: &Profile) -> ProgressStats {
        progress_stats(profile)
    }

    fn apply_and_save<T>(
        &self,
        profile: &mut Profile,
        apply: impl FnOnce(&mut Profile) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut next = profile.clone();
        let output = apply(&mut next)?;
        let revision = self.repo.save(&next)?;
        next.set_revision(revision);
        *profile = next;
        Ok(output)
    }
}
