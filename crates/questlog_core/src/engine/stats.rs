//! Read-only progress summaries for a profile.

use crate::engine::leveling::{level_progress_percent, xp_needed};
use crate::model::profile::Profile;
use crate::model::task::Difficulty;

/// Rewards earned from completed tasks of one difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyBreakdown {
    pub difficulty: Difficulty,
    pub completed: usize,
    pub xp: u64,
    pub coins: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub level: u32,
    pub xp: u64,
    pub xp_to_next_level: u64,
    pub level_progress_percent: u8,
    pub total_tasks: usize,
    /// Completed tasks still present in the live list.
    pub completed_tasks: usize,
    pub lifetime_completed_tasks: u64,
    pub completion_rate_percent: f64,
    pub average_xp_per_task: f64,
    pub average_coins_per_task: f64,
    pub hard_tasks_completed: usize,
    /// `None` until at least one task has been completed.
    pub estimated_tasks_to_next_level: Option<f64>,
    pub by_difficulty: Vec<DifficultyBreakdown>,
}

pub fn progress_stats(profile: &Profile) -> ProgressStats {
    let mut by_difficulty: Vec<DifficultyBreakdown> = Difficulty::ALL
        .iter()
        .map(|difficulty| DifficultyBreakdown {
            difficulty: *difficulty,
            completed: 0,
            xp: 0,
            coins: 0,
        })
        .collect();

    for task in profile.tasks().iter().filter(|task| task.is_completed()) {
        if let Some(entry) = by_difficulty
            .iter_mut()
            .find(|entry| entry.difficulty == task.difficulty)
        {
            entry.completed += 1;
            entry.xp += u64::from(task.xp_reward);
            entry.coins += u64::from(task.coin_reward);
        }
    }

    let total_tasks = profile.tasks().len();
    let completed_tasks: usize = by_difficulty.iter().map(|entry| entry.completed).sum();
    let completed_xp: u64 = by_difficulty.iter().map(|entry| entry.xp).sum();
    let completed_coins: u64 = by_difficulty.iter().map(|entry| entry.coins).sum();
    let hard_tasks_completed = by_difficulty
        .iter()
        .find(|entry| entry.difficulty == Difficulty::Hard)
        .map_or(0, |entry| entry.completed);

    let xp_to_next_level = xp_needed(profile.level()).saturating_sub(profile.xp());
    let (average_xp_per_task, average_coins_per_task) = if completed_tasks > 0 {
        (
            completed_xp as f64 / completed_tasks as f64,
            completed_coins as f64 / completed_tasks as f64,
        )
    } else {
        (0.0, 0.0)
    };
    let estimated_tasks_to_next_level = (completed_tasks > 0 && average_xp_per_task > 0.0)
        .then(|| xp_to_next_level as f64 / average_xp_per_task);
    let completion_rate_percent = if total_tasks > 0 {
        completed_tasks as f64 * 100.0 / total_tasks as f64
    } else {
        0.0
    };

    ProgressStats {
        level: profile.level(),
        xp: profile.xp(),
        xp_to_next_level,
        level_progress_percent: level_progress_percent(profile),
        total_tasks,
        completed_tasks,
        lifetime_completed_tasks: profile.total_completed_tasks(),
        completion_rate_percent,
        average_xp_per_task,
        average_coins_per_task,
        hard_tasks_completed,
        estimated_tasks_to_next_level,
        by_difficulty,
    }
}

#[cfg(test)]
mod tests {
    use super::progress_stats;
    use crate::engine::progress::{add_task, complete_task, TaskDraft};
    use crate::model::profile::Profile;
    use crate::model::task::Difficulty;

    #[test]
    fn empty_profile_has_no_estimate() {
        let profile = Profile::new("ada").unwrap();
        let stats = progress_stats(&profile);
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.xp_to_next_level, 100);
        assert_eq!(stats.estimated_tasks_to_next_level, None);
        assert_eq!(stats.completion_rate_percent, 0.0);
    }

    #[test]
    fn stats_summarize_completed_tasks() {
        let mut profile = Profile::new("ada").unwrap();
        add_task(
            &mut profile,
            &TaskDraft::new("proof")
                .with_rewards("40", "10")
                .with_difficulty(Difficulty::Hard),
        )
        .unwrap();
        add_task(&mut profile, &TaskDraft::new("reading").with_rewards("20", "0")).unwrap();
        complete_task(&mut profile, 0).unwrap();

        let stats = progress_stats(&profile);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.hard_tasks_completed, 1);
        assert_eq!(stats.completion_rate_percent, 50.0);
        assert_eq!(stats.average_xp_per_task, 40.0);
        assert_eq!(stats.xp_to_next_level, 60);
        assert_eq!(stats.level_progress_percent, 40);
        assert_eq!(stats.estimated_tasks_to_next_level, Some(1.5));
    }
}
