//! Shared study sessions and their reconciliation into durable profiles.
//!
//! # Responsibility
//! - Snapshot each stored participant's baseline at session start and give
//!   every participant an empty task list.
//! - Route in-session task operations to the owning participant only.
//! - On close, merge each participant's net-new progress into storage (or
//!   into the host's active profile) without double-crediting.
//!
//! # Invariants
//! - Participants are never persisted mid-session.
//! - A participant's merge is marked consumed only after it was persisted;
//!   `close` skips consumed participants, so repeated calls are no-ops and a
//!   failed call can be retried.
//! - Tasks already completed in the baseline are never re-credited.
//! - Stored merges are optimistic read-modify-write with bounded retries on
//!   revision conflicts.

use crate::engine::leveling::{add_coins, add_xp, lifetime_xp, LEVEL_UP_BONUS_COINS};
use crate::engine::progress::{
    self, CompletionReward, ProgressError, TaskDraft, TaskInputError,
};
use crate::model::leaderboard::LeaderboardEntry;
use crate::model::profile::Profile;
use crate::model::task::{now_epoch_ms, Task};
use crate::repo::leaderboard_repo::{publish_best_effort, LeaderboardPublisher};
use crate::repo::profile_repo::{ProfileRepository, RepoError};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reload-merge-save attempts before a revision conflict is surfaced.
const MAX_MERGE_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub enum SessionError {
    NoParticipants,
    DuplicateParticipant(String),
    UnknownParticipant(String),
    /// Participant was already reconciled; further progress would be lost.
    ParticipantClosed(String),
    /// Profile existed at session start but is gone at merge time.
    ProfileVanished(String),
    Input(TaskInputError),
    Progress(ProgressError),
    Repo(RepoError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoParticipants => write!(f, "a session needs at least one participant"),
            Self::DuplicateParticipant(username) => {
                write!(f, "participant joined twice: {username}")
            }
            Self::UnknownParticipant(username) => write!(f, "not a session participant: {username}"),
            Self::ParticipantClosed(username) => {
                write!(f, "session progress for {username} was already saved")
            }
            Self::ProfileVanished(username) => {
                write!(f, "profile {username} disappeared during the session")
            }
            Self::Input(err) => write!(f, "{err}"),
            Self::Progress(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Input(err) => Some(err),
            Self::Progress(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<TaskInputError> for SessionError {
    fn from(value: TaskInputError) -> Self {
        Self::Input(value)
    }
}

impl From<ProgressError> for SessionError {
    fn from(value: ProgressError) -> Self {
        Self::Progress(value)
    }
}

/// Host-side context: the profile currently open in single-player mode.
///
/// Passed explicitly to [`StudySession::close`] so a merge for that user
/// lands in the live value instead of a stale stored copy.
#[derive(Debug, Default)]
pub struct SessionHost {
    active: Option<Profile>,
}

impl SessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active(profile: Profile) -> Self {
        Self {
            active: Some(profile),
        }
    }

    /// Replaces the active profile, returning the previous one.
    pub fn activate(&mut self, profile: Profile) -> Option<Profile> {
        self.active.replace(profile)
    }

    pub fn logout(&mut self) -> Option<Profile> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&Profile> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Profile> {
        self.active.as_mut()
    }

    fn active_for(&mut self, username: &str) -> Option<&mut Profile> {
        self.active
            .as_mut()
            .filter(|profile| profile.username() == username)
    }
}

/// Immutable snapshot of a stored profile taken at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBaseline {
    username: String,
    xp: u64,
    level: u32,
    coins: u64,
    tasks: Vec<Task>,
}

impl SessionBaseline {
    fn capture(profile: &Profile) -> Self {
        Self {
            username: profile.username().to_string(),
            xp: profile.xp(),
            level: profile.level(),
            coins: profile.coins(),
            tasks: profile.tasks().to_vec(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn xp(&self) -> u64 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn coins(&self) -> u64 {
        self.coins
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    fn completed(&self, description: &str) -> bool {
        self.tasks
            .iter()
            .any(|task| task.description == description && task.is_completed())
    }
}

/// Net progress of one participant relative to its baseline.
///
/// XP is compared as lifetime XP so level-ups inside the session are not
/// lost, and coins exclude level-up bonuses, which `add_xp` re-grants on the
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDelta {
    pub xp_gained: i64,
    pub coins_gained: i64,
    /// Completed tasks in the live list.
    pub completed_in_session: u64,
    /// Completions not already recorded in the baseline; added to the
    /// lifetime counter.
    pub credited_completions: u64,
}

impl SessionDelta {
    pub fn between(baseline: &SessionBaseline, live: &Profile) -> Self {
        let live_xp = lifetime_xp(live.level(), live.xp());
        let baseline_xp = lifetime_xp(baseline.level, baseline.xp);
        let level_bonus = u64::from(live.level().saturating_sub(baseline.level))
            .saturating_mul(LEVEL_UP_BONUS_COINS);
        let completed = live.tasks().iter().filter(|task| task.is_completed());
        let credited = completed
            .clone()
            .filter(|task| !baseline.completed(&task.description))
            .count();
        Self {
            xp_gained: signed_diff(live_xp, baseline_xp),
            coins_gained: signed_diff(live.coins().saturating_sub(level_bonus), baseline.coins),
            completed_in_session: completed.count() as u64,
            credited_completions: credited as u64,
        }
    }

    /// Nothing worth merging: no XP, no coins, no completions.
    pub fn is_empty(&self) -> bool {
        self.xp_gained <= 0 && self.coins_gained <= 0 && self.completed_in_session == 0
    }
}

fn signed_diff(after: u64, before: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |diff| -diff)
    }
}

/// What a merge actually changed on the target profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub xp_gained: u64,
    pub levels_gained: u32,
    pub coins_gained: i64,
    pub tasks_completed: u64,
}

impl MergeSummary {
    fn between(before: &Profile, after: &Profile, tasks_completed: u64) -> Self {
        Self {
            xp_gained: lifetime_xp(after.level(), after.xp())
                .saturating_sub(lifetime_xp(before.level(), before.xp())),
            levels_gained: after.level().saturating_sub(before.level()),
            coins_gained: signed_diff(after.coins(), before.coins()),
            tasks_completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Progress merged into the freshly reloaded stored profile.
    Merged(MergeSummary),
    /// Progress merged into the host's active profile, then saved.
    MergedIntoActive(MergeSummary),
    /// No gains; storage untouched.
    NoChanges,
    /// Guest state stored as a new profile.
    GuestSaved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantOutcome {
    pub username: String,
    pub outcome: MergeOutcome,
}

#[derive(Debug)]
struct Participant {
    profile: Profile,
    baseline: Option<SessionBaseline>,
    reconciled: bool,
}

/// A local multiplayer study session.
#[derive(Debug)]
pub struct StudySession {
    participants: Vec<Participant>,
}

impl StudySession {
    /// Starts a session for `profiles`, in turn order.
    ///
    /// Stored usernames join with their stored state, which also becomes
    /// their baseline; the passed value only names them. Unknown usernames
    /// join as guests with the passed state. Every participant starts with
    /// no tasks.
    pub fn start<R: ProfileRepository + ?Sized>(
        repo: &R,
        profiles: Vec<Profile>,
    ) -> Result<Self, SessionError> {
        if profiles.is_empty() {
            return Err(SessionError::NoParticipants);
        }

        let mut seen = HashSet::new();
        let mut participants = Vec::with_capacity(profiles.len());
        for requested in profiles {
            if !seen.insert(requested.username().to_string()) {
                return Err(SessionError::DuplicateParticipant(
                    requested.username().to_string(),
                ));
            }

            let (mut profile, baseline) = if repo.exists(requested.username())? {
                let stored = repo.load(requested.username())?.ok_or_else(|| {
                    SessionError::ProfileVanished(requested.username().to_string())
                })?;
                let baseline = SessionBaseline::capture(&stored);
                (stored, Some(baseline))
            } else {
                (requested, None)
            };

            profile.tasks.clear();
            participants.push(Participant {
                profile,
                baseline,
                reconciled: false,
            });
        }

        let guests = participants
            .iter()
            .filter(|participant| participant.baseline.is_none())
            .count();
        info!(
            "event=session_start module=session status=ok participants={} guests={}",
            participants.len(),
            guests
        );
        Ok(Self { participants })
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .map(|participant| participant.profile.username())
    }

    /// Live in-session state of one participant.
    pub fn participant(&self, username: &str) -> Option<&Profile> {
        self.find(username).map(|participant| &participant.profile)
    }

    pub fn baseline(&self, username: &str) -> Option<&SessionBaseline> {
        self.find(username)
            .and_then(|participant| participant.baseline.as_ref())
    }

    pub fn is_guest(&self, username: &str) -> bool {
        self.find(username)
            .is_some_and(|participant| participant.baseline.is_none())
    }

    /// Whether every participant has been reconciled.
    pub fn is_closed(&self) -> bool {
        self.participants
            .iter()
            .all(|participant| participant.reconciled)
    }

    pub fn add_task(&mut self, username: &str, draft: &TaskDraft) -> Result<usize, SessionError> {
        let profile = self.live_mut(username)?;
        Ok(progress::add_task(profile, draft)?)
    }

    /// Completes a participant's task and publishes their live standing.
    pub fn complete_task<P: LeaderboardPublisher + ?Sized>(
        &mut self,
        username: &str,
        index: usize,
        publisher: &P,
    ) -> Result<CompletionReward, SessionError> {
        let profile = self.live_mut(username)?;
        let reward = progress::complete_task(profile, index)?;
        publish_best_effort(publisher, profile);
        Ok(reward)
    }

    pub fn delete_task(&mut self, username: &str, index: usize) -> Result<Task, SessionError> {
        let profile = self.live_mut(username)?;
        Ok(progress::delete_task(profile, index)?)
    }

    /// Live standings of all participants, best first.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .participants
            .iter()
            .map(|participant| LeaderboardEntry::from_profile(&participant.profile))
            .collect();
        entries.sort_by(|left, right| {
            right
                .level
                .cmp(&left.level)
                .then(right.xp.cmp(&left.xp))
                .then(right.total_completed_tasks.cmp(&left.total_completed_tasks))
        });
        entries
    }

    /// Reconciles every not-yet-reconciled participant.
    ///
    /// Stops at the first failure and returns it; participants merged before
    /// the failure stay consumed, so calling `close` again resumes with the
    /// rest. Once all participants are consumed, returns an empty list.
    pub fn close<R, P>(
        &mut self,
        repo: &R,
        publisher: &P,
        host: &mut SessionHost,
    ) -> Result<Vec<ParticipantOutcome>, SessionError>
    where
        R: ProfileRepository + ?Sized,
        P: LeaderboardPublisher + ?Sized,
    {
        let mut outcomes = Vec::new();
        for participant in self
            .participants
            .iter_mut()
            .filter(|participant| !participant.reconciled)
        {
            let username = participant.profile.username().to_string();
            let outcome = reconcile_participant(participant, repo, publisher, host)?;
            participant.reconciled = true;
            info!(
                "event=session_merge module=session status=ok username={} outcome={}",
                username,
                outcome_label(&outcome)
            );
            outcomes.push(ParticipantOutcome { username, outcome });
        }
        Ok(outcomes)
    }

    fn find(&self, username: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|participant| participant.profile.username() == username)
    }

    fn live_mut(&mut self, username: &str) -> Result<&mut Profile, SessionError> {
        let participant = self
            .participants
            .iter_mut()
            .find(|participant| participant.profile.username() == username)
            .ok_or_else(|| SessionError::UnknownParticipant(username.to_string()))?;
        if participant.reconciled {
            return Err(SessionError::ParticipantClosed(username.to_string()));
        }
        Ok(&mut participant.profile)
    }
}

fn outcome_label(outcome: &MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Merged(_) => "merged",
        MergeOutcome::MergedIntoActive(_) => "merged_active",
        MergeOutcome::NoChanges => "no_changes",
        MergeOutcome::GuestSaved => "guest_saved",
    }
}

fn reconcile_participant<R, P>(
    participant: &mut Participant,
    repo: &R,
    publisher: &P,
    host: &mut SessionHost,
) -> Result<MergeOutcome, SessionError>
where
    R: ProfileRepository + ?Sized,
    P: LeaderboardPublisher + ?Sized,
{
    let Some(baseline) = participant.baseline.as_ref() else {
        let revision = repo.save(&participant.profile)?;
        participant.profile.set_revision(revision);
        publish_best_effort(publisher, &participant.profile);
        return Ok(MergeOutcome::GuestSaved);
    };

    let live = &participant.profile;
    let delta = SessionDelta::between(baseline, live);
    if delta.is_empty() {
        debug!(
            "event=session_merge module=session status=skip username={} reason=no_gains",
            live.username()
        );
        return Ok(MergeOutcome::NoChanges);
    }

    if let Some(active) = host.active_for(live.username()) {
        let summary = merge_into_active(active, live, baseline, &delta, repo)?;
        publish_best_effort(publisher, active);
        return Ok(MergeOutcome::MergedIntoActive(summary));
    }

    let (target, summary) = merge_into_stored(live, baseline, &delta, repo)?;
    publish_best_effort(publisher, &target);
    Ok(MergeOutcome::Merged(summary))
}

/// Applies the session delta to the host's active profile, then saves it.
///
/// The delta is added rather than the live values copied, so progress the
/// active profile made outside the session is kept and its level never
/// drops.
fn merge_into_active<R: ProfileRepository + ?Sized>(
    active: &mut Profile,
    live: &Profile,
    baseline: &SessionBaseline,
    delta: &SessionDelta,
    repo: &R,
) -> Result<MergeSummary, SessionError> {
    let mut next = active.clone();
    apply_delta(&mut next, live, baseline, delta);

    let revision = repo.save(&next)?;
    next.set_revision(revision);
    let summary = MergeSummary::between(active, &next, delta.credited_completions);
    *active = next;
    Ok(summary)
}

/// Reload-merge-save against storage, retrying on revision conflicts.
fn merge_into_stored<R: ProfileRepository + ?Sized>(
    live: &Profile,
    baseline: &SessionBaseline,
    delta: &SessionDelta,
    repo: &R,
) -> Result<(Profile, MergeSummary), SessionError> {
    let username = live.username();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let before = repo
            .load(username)?
            .ok_or_else(|| SessionError::ProfileVanished(username.to_string()))?;

        let mut target = before.clone();
        apply_delta(&mut target, live, baseline, delta);

        match repo.save(&target) {
            Ok(revision) => {
                target.set_revision(revision);
                let summary = MergeSummary::between(&before, &target, delta.credited_completions);
                return Ok((target, summary));
            }
            Err(RepoError::Conflict { .. }) if attempt < MAX_MERGE_ATTEMPTS => {
                warn!(
                    "event=session_merge module=session status=retry username={} attempt={}",
                    username, attempt
                );
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Credits positive XP and coin gains, counts new completions and transfers
/// completed tasks.
fn apply_delta(
    target: &mut Profile,
    live: &Profile,
    baseline: &SessionBaseline,
    delta: &SessionDelta,
) {
    if let Ok(xp) = u64::try_from(delta.xp_gained) {
        add_xp(target, xp);
    }
    if let Ok(coins) = u64::try_from(delta.coins_gained) {
        add_coins(target, coins);
    }
    target.total_completed_tasks = target
        .total_completed_tasks
        .saturating_add(delta.credited_completions);
    transfer_completed_tasks(live, baseline, target);
}

/// Copies session completions into `target`, keyed by description.
///
/// Completions already present in the baseline are skipped; existing
/// open tasks are marked completed, unknown ones are appended.
fn transfer_completed_tasks(live: &Profile, baseline: &SessionBaseline, target: &mut Profile) {
    for task in live.tasks().iter().filter(|task| task.is_completed()) {
        if baseline.completed(&task.description) {
            continue;
        }
        match target
            .tasks
            .iter_mut()
            .find(|existing| existing.description == task.description)
        {
            Some(existing) => {
                existing.complete_at(task.completed_at().unwrap_or_else(now_epoch_ms));
            }
            None => target.tasks.push(task.clone()),
        }
    }
}
