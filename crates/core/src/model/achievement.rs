use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AchievementId, UserId};
use crate::model::quiz::QuizType;

/// Unlock rule for an achievement, stored as JSON tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criterion {
    /// Lifetime completed sessions across all drill modes.
    TotalQuizzes { count: u32 },
    /// A session finished with every answer correct.
    PerfectScore,
    /// Consecutive practice days.
    Streak { days: u32 },
    /// Lifetime completed sessions of one drill mode.
    QuizCount { quiz_type: QuizType, count: u32 },
    /// A criterion this build does not know about. Never unlocks.
    #[serde(other)]
    Unknown,
}

/// Catalog entry before it has been assigned an id by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAchievement {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub criteria: Criterion,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub criteria: Criterion,
}

/// A learner has earned an achievement. `(user_id, achievement_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementGrant {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
    pub earned_at: DateTime<Utc>,
}

/// How far a learner is from an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementProgress {
    pub current: u32,
    pub target: u32,
    /// Whole percent in `0..=100`, floored.
    pub percentage: u8,
}

fn entry(name: &str, display_name: &str, description: &str, criteria: Criterion) -> NewAchievement {
    NewAchievement {
        name: name.to_owned(),
        display_name: display_name.to_owned(),
        description: description.to_owned(),
        criteria,
    }
}

/// The built-in achievement catalog, keyed by `name`.
#[must_use]
pub fn default_catalog() -> Vec<NewAchievement> {
    vec![
        entry(
            "first_quiz",
            "First Steps",
            "Complete your first quiz",
            Criterion::TotalQuizzes { count: 1 },
        ),
        entry(
            "quiz_10",
            "Getting Serious",
            "Complete 10 quizzes",
            Criterion::TotalQuizzes { count: 10 },
        ),
        entry(
            "quiz_50",
            "Dedicated",
            "Complete 50 quizzes",
            Criterion::TotalQuizzes { count: 50 },
        ),
        entry(
            "quiz_100",
            "Centurion",
            "Complete 100 quizzes",
            Criterion::TotalQuizzes { count: 100 },
        ),
        entry(
            "perfect_score",
            "Flawless",
            "Answer all 10 questions of a quiz correctly",
            Criterion::PerfectScore,
        ),
        entry(
            "streak_3",
            "Warming Up",
            "Practice 3 days in a row",
            Criterion::Streak { days: 3 },
        ),
        entry(
            "streak_7",
            "Week Streak",
            "Practice 7 days in a row",
            Criterion::Streak { days: 7 },
        ),
        entry(
            "streak_30",
            "Monthly Habit",
            "Practice 30 days in a row",
            Criterion::Streak { days: 30 },
        ),
        entry(
            "locate_note_25",
            "Fretboard Navigator",
            "Complete 25 locate-note quizzes",
            Criterion::QuizCount {
                quiz_type: QuizType::LocateNote,
                count: 25,
            },
        ),
        entry(
            "name_note_25",
            "Note Namer",
            "Complete 25 name-note quizzes",
            Criterion::QuizCount {
                quiz_type: QuizType::NameNote,
                count: 25,
            },
        ),
        entry(
            "chord_tones_25",
            "Chord Builder",
            "Complete 25 chord-tone quizzes",
            Criterion::QuizCount {
                quiz_type: QuizType::ChordTones,
                count: 25,
            },
        ),
        entry(
            "intervals_25",
            "Interval Ear",
            "Complete 25 interval quizzes",
            Criterion::QuizCount {
                quiz_type: QuizType::Intervals,
                count: 25,
            },
        ),
    ]
}
