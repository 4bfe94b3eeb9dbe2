use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::round1;
use crate::model::{Difficulty, Profile, QuizType, Session, SessionStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizTypeStats {
    pub quiz_type: QuizType,
    pub count: u32,
    /// One decimal place; 0 when `count` is 0.
    pub average_score: f64,
    pub best_score: u8,
    pub total_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyStats {
    pub difficulty: Difficulty,
    pub count: u32,
    pub average_score: f64,
}

/// Average score in the latest window versus the window before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub recent_average: f64,
    pub prior_average: f64,
    pub recent_sessions: u32,
    pub prior_sessions: u32,
    /// Percent change from prior to recent, one decimal place.
    pub improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_sessions: u32,
    pub total_practice_seconds: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub by_quiz_type: Vec<QuizTypeStats>,
    pub by_difficulty: Vec<DifficultyStats>,
    pub trend: Trend,
}

#[derive(Default)]
struct ScoreTally {
    count: u32,
    sum: u64,
}

impl ScoreTally {
    fn push(&mut self, score: u8) {
        self.count = self.count.saturating_add(1);
        self.sum += u64::from(score);
    }

    #[allow(clippy::cast_precision_loss)]
    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / f64::from(self.count)
        }
    }
}

fn scored(sessions: &[Session]) -> impl Iterator<Item = (&Session, u8)> {
    sessions
        .iter()
        .filter(|s| s.status() == SessionStatus::Completed)
        .filter_map(|s| s.score().map(|score| (s, score)))
}

/// Compare the average score in `[now - window, now]` with
/// `[now - 2 * window, now - window)`.
///
/// Improvement is 100 when only the recent window has data and 0 when
/// neither does. A prior average of zero is treated like an empty prior
/// window so the ratio stays finite.
#[must_use]
pub fn trend(sessions: &[Session], now: DateTime<Utc>, window_days: u32) -> Trend {
    let window = Duration::days(i64::from(window_days));
    let recent_start = now - window;
    let prior_start = recent_start - window;

    let mut recent = ScoreTally::default();
    let mut prior = ScoreTally::default();
    for (session, score) in scored(sessions) {
        let Some(done) = session.completed_at() else {
            continue;
        };
        if done >= recent_start && done <= now {
            recent.push(score);
        } else if done >= prior_start && done < recent_start {
            prior.push(score);
        }
    }

    let (recent_avg, prior_avg) = (recent.average(), prior.average());
    let improvement = match (recent.count, prior.count) {
        (0, 0) => 0.0,
        (_, 0) => 100.0,
        _ if prior_avg == 0.0 => {
            if recent_avg > 0.0 {
                100.0
            } else {
                0.0
            }
        }
        _ => round1((recent_avg - prior_avg) / prior_avg * 100.0),
    };

    Trend {
        recent_average: round1(recent_avg),
        prior_average: round1(prior_avg),
        recent_sessions: recent.count,
        prior_sessions: prior.count,
        improvement,
    }
}

/// Per-drill-mode totals, one entry per `QuizType` in declaration order.
#[must_use]
pub fn quiz_type_stats(sessions: &[Session]) -> Vec<QuizTypeStats> {
    let mut by_type: [(ScoreTally, u8, u64); 4] = Default::default();
    for (session, score) in scored(sessions) {
        let slot = &mut by_type[quiz_slot(session.quiz_type())];
        slot.0.push(score);
        slot.1 = slot.1.max(score);
        slot.2 += u64::from(session.time_taken_seconds().unwrap_or(0));
    }

    QuizType::ALL
        .into_iter()
        .map(|quiz_type| {
            let (tally, best, seconds) = &by_type[quiz_slot(quiz_type)];
            QuizTypeStats {
                quiz_type,
                count: tally.count,
                average_score: round1(tally.average()),
                best_score: *best,
                total_seconds: *seconds,
            }
        })
        .collect()
}

/// Lifetime summary of completed sessions plus the recent trend.
#[must_use]
pub fn overview(
    sessions: &[Session],
    profile: &Profile,
    now: DateTime<Utc>,
    window_days: u32,
) -> Overview {
    let mut total_sessions = 0_u32;
    let mut total_practice_seconds = 0_u64;
    let mut by_difficulty: [ScoreTally; 3] = Default::default();

    for (session, score) in scored(sessions) {
        total_sessions = total_sessions.saturating_add(1);
        total_practice_seconds += u64::from(session.time_taken_seconds().unwrap_or(0));
        by_difficulty[difficulty_slot(session.difficulty())].push(score);
    }

    let by_difficulty = Difficulty::ALL
        .into_iter()
        .map(|difficulty| {
            let tally = &by_difficulty[difficulty_slot(difficulty)];
            DifficultyStats {
                difficulty,
                count: tally.count,
                average_score: round1(tally.average()),
            }
        })
        .collect();

    Overview {
        total_sessions,
        total_practice_seconds,
        current_streak: profile.current_streak(),
        longest_streak: profile.longest_streak(),
        by_quiz_type: quiz_type_stats(sessions),
        by_difficulty,
        trend: trend(sessions, now, window_days),
    }
}

fn quiz_slot(quiz_type: QuizType) -> usize {
    match quiz_type {
        QuizType::LocateNote => 0,
        QuizType::NameNote => 1,
        QuizType::ChordTones => 2,
        QuizType::Intervals => 3,
    }
}

fn difficulty_slot(difficulty: Difficulty) -> usize {
    match difficulty {
        Difficulty::Easy => 0,
        Difficulty::Medium => 1,
        Difficulty::Hard => 2,
    }
}
