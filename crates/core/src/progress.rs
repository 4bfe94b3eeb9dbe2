//! Achievement progress and eligibility.

use std::collections::HashSet;

use crate::model::{Achievement, AchievementId, AchievementProgress, Criterion, Profile};
use crate::model::QUESTIONS_PER_SESSION;

/// Floored whole percentage of `current` toward `target`, capped at 100.
#[must_use]
pub fn percentage(current: u32, target: u32) -> u8 {
    if target == 0 {
        return 100;
    }
    let pct = (u64::from(current) * 100 / u64::from(target)).min(100);
    u8::try_from(pct).unwrap_or(100)
}

/// Progress of `profile` toward `criterion`.
///
/// `PerfectScore` is binary and reports `0/1` until earned; unknown criteria
/// report `0/1` as well.
#[must_use]
pub fn progress(criterion: &Criterion, profile: &Profile) -> AchievementProgress {
    let (current, target) = match criterion {
        Criterion::TotalQuizzes { count } => (profile.total_quizzes(), *count),
        Criterion::PerfectScore | Criterion::Unknown => (0, 1),
        Criterion::Streak { days } => (profile.current_streak(), *days),
        Criterion::QuizCount { quiz_type, count } => (profile.quiz_count(*quiz_type), *count),
    };
    AchievementProgress {
        current,
        target,
        percentage: percentage(current, target),
    }
}

/// Whether `criterion` is met by an updated profile and the score of the
/// session that was just finalized.
#[must_use]
pub fn is_eligible(criterion: &Criterion, profile: &Profile, score: Option<u8>) -> bool {
    match criterion {
        Criterion::TotalQuizzes { count } => profile.total_quizzes() >= *count,
        Criterion::PerfectScore => score == Some(QUESTIONS_PER_SESSION),
        Criterion::Streak { days } => profile.current_streak() >= *days,
        Criterion::QuizCount { quiz_type, count } => profile.quiz_count(*quiz_type) >= *count,
        Criterion::Unknown => false,
    }
}

/// Catalog entries not yet earned whose criteria are now met.
///
/// Each entry is judged on its own, so the result does not depend on catalog order.
#[must_use]
pub fn newly_eligible(
    catalog: &[Achievement],
    earned: &HashSet<AchievementId>,
    profile: &Profile,
    score: Option<u8>,
) -> Vec<AchievementId> {
    catalog
        .iter()
        .filter(|a| !earned.contains(&a.id))
        .filter(|a| is_eligible(&a.criteria, profile, score))
        .map(|a| a.id)
        .collect()
}
