//! Leveling state machine over a profile's XP/level/coin triple.
//!
//! # Invariants
//! - `xp_needed` is strictly increasing for every level a profile can
//!   realistically reach, and never zero.
//! - `add_xp` leaves `xp < xp_needed(level)` and never lowers `level`.
//! - Coins never go negative; a failed spend does not mutate.

use crate::model::profile::Profile;

/// XP required to leave level 1.
pub const BASE_LEVEL_XP: f64 = 100.0;
/// Geometric growth of the per-level threshold.
pub const LEVEL_XP_GROWTH: f64 = 1.5;
/// Coins granted for every level gained.
pub const LEVEL_UP_BONUS_COINS: u64 = 50;

/// XP needed to advance from `level` to `level + 1`.
///
/// `floor(100 * 1.5^(level - 1))`; level 0 is treated as level 1.
pub fn xp_needed(level: u32) -> u64 {
    let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    // `as` saturates at u64::MAX for thresholds beyond the integer range.
    (BASE_LEVEL_XP * LEVEL_XP_GROWTH.powi(exponent)).floor() as u64
}

/// Lifetime XP represented by a `(level, xp)` pair.
///
/// Sum of every threshold below `level` plus the in-level progress. Used to
/// compare two states across level-ups, where raw `xp` resets.
pub fn lifetime_xp(level: u32, xp: u64) -> u64 {
    (1..level.max(1))
        .map(xp_needed)
        .fold(xp, |total, needed| total.saturating_add(needed))
}

/// Adds XP and applies every level-up it triggers.
///
/// Each level-up subtracts the current threshold, increments `level` and
/// grants [`LEVEL_UP_BONUS_COINS`]. Returns the number of levels gained.
pub fn add_xp(profile: &mut Profile, amount: u64) -> u32 {
    profile.xp = profile.xp.saturating_add(amount);

    let mut levels_gained = 0;
    while profile.level < u32::MAX {
        let needed = xp_needed(profile.level);
        if needed == 0 || profile.xp < needed {
            break;
        }
        profile.xp -= needed;
        profile.level += 1;
        profile.coins = profile.coins.saturating_add(LEVEL_UP_BONUS_COINS);
        levels_gained += 1;
    }
    levels_gained
}

/// Spends coins if the balance covers `amount`.
///
/// Returns `false` without mutation when funds are insufficient.
pub fn spend_coins(profile: &mut Profile, amount: u64) -> bool {
    if profile.coins < amount {
        return false;
    }
    profile.coins -= amount;
    true
}

pub fn add_coins(profile: &mut Profile, amount: u64) {
    profile.coins = profile.coins.saturating_add(amount);
}

/// Percentage (0..=100) of the current level's threshold already earned.
pub fn level_progress_percent(profile: &Profile) -> u8 {
    let needed = xp_needed(profile.level);
    if needed == 0 {
        return 0;
    }
    let percent = u128::from(profile.xp) * 100 / u128::from(needed);
    u8::try_from(percent.min(100)).unwrap_or(100)
}
