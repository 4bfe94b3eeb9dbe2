use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;
use crate::model::quiz::QuizType;
use crate::streak::{StreakState, advance_streak};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("longest streak ({longest}) is shorter than current streak ({current})")]
    StreakInvariant { current: u32, longest: u32 },
}

/// Lifetime completed-session counters, one per drill mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizCounters {
    pub locate_note: u32,
    pub name_note: u32,
    pub chord_tones: u32,
    pub intervals: u32,
}

impl QuizCounters {
    #[must_use]
    pub fn get(&self, quiz_type: QuizType) -> u32 {
        match quiz_type {
            QuizType::LocateNote => self.locate_note,
            QuizType::NameNote => self.name_note,
            QuizType::ChordTones => self.chord_tones,
            QuizType::Intervals => self.intervals,
        }
    }

    fn get_mut(&mut self, quiz_type: QuizType) -> &mut u32 {
        match quiz_type {
            QuizType::LocateNote => &mut self.locate_note,
            QuizType::NameNote => &mut self.name_note,
            QuizType::ChordTones => &mut self.chord_tones,
            QuizType::Intervals => &mut self.intervals,
        }
    }

    pub fn increment(&mut self, quiz_type: QuizType) {
        let slot = self.get_mut(quiz_type);
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        QuizType::ALL
            .into_iter()
            .fold(0_u32, |acc, q| acc.saturating_add(self.get(q)))
    }
}

/// Per-learner progress state. Only finalization mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    user_id: UserId,
    current_streak: u32,
    longest_streak: u32,
    last_activity_date: Option<NaiveDate>,
    counters: QuizCounters,
}

impl Profile {
    /// A fresh profile with no activity.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            counters: QuizCounters::default(),
        }
    }

    /// Rehydrate a profile from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::StreakInvariant` if `longest_streak < current_streak`.
    pub fn from_persisted(
        user_id: UserId,
        current_streak: u32,
        longest_streak: u32,
        last_activity_date: Option<NaiveDate>,
        counters: QuizCounters,
    ) -> Result<Self, ProfileError> {
        if longest_streak < current_streak {
            return Err(ProfileError::StreakInvariant {
                current: current_streak,
                longest: longest_streak,
            });
        }
        Ok(Self {
            user_id,
            current_streak,
            longest_streak,
            last_activity_date,
            counters,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    #[must_use]
    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    #[must_use]
    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.last_activity_date
    }

    #[must_use]
    pub fn counters(&self) -> &QuizCounters {
        &self.counters
    }

    #[must_use]
    pub fn quiz_count(&self, quiz_type: QuizType) -> u32 {
        self.counters.get(quiz_type)
    }

    #[must_use]
    pub fn total_quizzes(&self) -> u32 {
        self.counters.total()
    }

    /// The profile after one more completed session of `quiz_type` on `today`.
    ///
    /// Advances the streak, bumps the matching counter and stamps the
    /// activity date; the caller persists the result as a single update.
    #[must_use]
    pub fn after_completion(&self, quiz_type: QuizType, today: NaiveDate) -> Self {
        let streak = advance_streak(
            StreakState {
                current: self.current_streak,
                longest: self.longest_streak,
            },
            self.last_activity_date,
            today,
        );
        let mut counters = self.counters;
        counters.increment(quiz_type);

        Self {
            user_id: self.user_id.clone(),
            current_streak: streak.current,
            longest_streak: streak.longest,
            last_activity_date: Some(today),
            counters,
        }
    }
}
