//! Task ranking and effort-budgeted selection.
//!
//! # Responsibility
//! - Rank open tasks by combined reward for recommendation lists.
//! - Pick the highest-reward subset of tasks that fits a level-scaled
//!   effort budget (0/1 knapsack).
//!
//! # Invariants
//! - Ranking never returns completed tasks and keeps input order on ties.
//! - A selection's total effort never exceeds the budget for the level.
//! - Among equally rewarding selections, the one with more hard tasks wins.

use crate::model::task::{Difficulty, Task};

/// Effort weights, indexed in `Difficulty::ALL` order.
const EFFORT_WEIGHTS: [(Difficulty, u32); 3] = [
    (Difficulty::Easy, 2),
    (Difficulty::Medium, 5),
    (Difficulty::Hard, 8),
];

const BASE_EFFORT_BUDGET: u32 = 10;
const EFFORT_BUDGET_PER_LEVEL: u32 = 5;

/// Effort cost of one task of the given difficulty.
pub fn effort_of(difficulty: Difficulty) -> u32 {
    EFFORT_WEIGHTS
        .iter()
        .find(|(kind, _)| *kind == difficulty)
        .map_or(0, |(_, weight)| *weight)
}

/// Effort budget available at `level`: `10 + (level - 1) * 5`.
pub fn effort_budget(level: u32) -> u32 {
    BASE_EFFORT_BUDGET.saturating_add(
        level
            .saturating_sub(1)
            .saturating_mul(EFFORT_BUDGET_PER_LEVEL),
    )
}

/// Open tasks ordered by descending `xp_reward + coin_reward`.
///
/// The sort is stable, so equally rewarding tasks keep their list order.
pub fn prioritize(tasks: &[Task]) -> Vec<&Task> {
    let mut open: Vec<&Task> = tasks.iter().filter(|task| !task.is_completed()).collect();
    open.sort_by(|left, right| right.value().cmp(&left.value()));
    open
}

/// Result of an effort-budgeted selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelection<'a> {
    /// Chosen tasks in input order.
    pub tasks: Vec<&'a Task>,
    pub total_effort: u32,
    pub total_value: u64,
    pub budget: u32,
}

impl TaskSelection<'_> {
    pub fn hard_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.difficulty == Difficulty::Hard)
            .count()
    }
}

/// Best `(value, hard_count)` reachable with an exact effort total.
type Score = (u64, u32);

/// Solves the 0/1 knapsack over `tasks` for the budget at `level`.
///
/// Completion state is not consulted; callers pass the candidate tasks.
///
/// `table[i][e]` holds the best score using the first `i` tasks with total
/// effort exactly `e`, or `None` when that total is infeasible. The answer
/// is the best score over all feasible totals; ties on value prefer more
/// hard tasks, then the larger effort total.
pub fn select_optimal_tasks<'a, I>(tasks: I, level: u32) -> TaskSelection<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let tasks: Vec<&'a Task> = tasks.into_iter().collect();
    let budget = effort_budget(level);
    let efforts: Vec<usize> = tasks
        .iter()
        .map(|task| effort_of(task.difficulty) as usize)
        .collect();
    // Efforts beyond the sum of all tasks are unreachable.
    let capacity = (budget as usize).min(efforts.iter().sum());

    let mut table: Vec<Vec<Option<Score>>> = vec![vec![None; capacity + 1]; tasks.len() + 1];
    table[0][0] = Some((0, 0));

    for (index, task) in tasks.iter().enumerate() {
        let effort = efforts[index];
        let hard = u32::from(task.difficulty == Difficulty::Hard);
        for used in 0..=capacity {
            let skip = table[index][used];
            let take = if used >= effort {
                table[index][used - effort]
                    .map(|(value, hards)| (value + task.value(), hards + hard))
            } else {
                None
            };
            table[index + 1][used] = match (skip, take) {
                (Some(skip), Some(take)) if take > skip => Some(take),
                (Some(skip), _) => Some(skip),
                (None, take) => take,
            };
        }
    }

    let last = &table[tasks.len()];
    let mut best: Option<(usize, Score)> = None;
    for used in (0..=capacity).rev() {
        if let Some(score) = last[used] {
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((used, score));
            }
        }
    }

    let Some((best_effort, (total_value, _))) = best else {
        return TaskSelection {
            tasks: Vec::new(),
            total_effort: 0,
            total_value: 0,
            budget,
        };
    };

    let mut chosen = Vec::new();
    let mut remaining = best_effort;
    for index in (0..tasks.len()).rev() {
        if table[index + 1][remaining] != table[index][remaining] {
            chosen.push(tasks[index]);
            remaining -= efforts[index];
        }
    }
    chosen.reverse();

    TaskSelection {
        tasks: chosen,
        total_effort: best_effort as u32,
        total_value,
        budget,
    }
}
