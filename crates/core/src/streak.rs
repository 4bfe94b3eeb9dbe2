//! Daily practice streaks.
//!
//! Days are calendar dates in the learner's local offset, never elapsed
//! 24-hour windows, so month, year and leap-day boundaries fall out of
//! `NaiveDate` arithmetic.

use chrono::NaiveDate;
use serde::Serialize;

/// Current and longest streak, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakState {
    pub current: u32,
    pub longest: u32,
}

/// Advance a streak for a completion on `today`.
///
/// - same day as the last activity: unchanged
/// - exactly one day later: `current + 1`
/// - any larger gap, or no previous activity: restart at 1
///
/// `longest` never decreases. A last activity dated after `today` (the
/// learner moved to an earlier offset) is treated like a same-day completion.
#[must_use]
pub fn advance_streak(
    state: StreakState,
    last_activity: Option<NaiveDate>,
    today: NaiveDate,
) -> StreakState {
    let current = match last_activity {
        Some(last) => match today.signed_duration_since(last).num_days() {
            ..=0 => return state,
            1 => state.current.saturating_add(1),
            _ => 1,
        },
        None => 1,
    };

    StreakState {
        current,
        longest: state.longest.max(current),
    }
}
