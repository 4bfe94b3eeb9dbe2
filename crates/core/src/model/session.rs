use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{SessionId, UserId};
use crate::model::quiz::{Difficulty, ParseEnumError, QuizType};

/// Every drill runs exactly this many questions.
pub const QUESTIONS_PER_SESSION: u8 = 10;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionModelError {
    #[error("hard difficulty requires a time limit")]
    MissingTimeLimit,

    #[error("time limit must be a positive number of seconds")]
    InvalidTimeLimit,

    #[error("session is {status}, not in progress")]
    NotActive { status: SessionStatus },

    #[error("session has {found} answers, {expected} required to complete")]
    IncompleteAnswers { expected: u8, found: usize },

    #[error("score {0} is outside 0..={QUESTIONS_PER_SESSION}")]
    InvalidScore(u8),

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("finalized session is missing completed_at")]
    MissingCompletion,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle state. `InProgress` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            _ => Err(ParseEnumError {
                kind: "session status",
                raw: s.to_owned(),
            }),
        }
    }
}

/// Terminal state requested by a finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Completed,
    Abandoned,
}

impl From<FinalStatus> for SessionStatus {
    fn from(value: FinalStatus) -> Self {
        match value {
            FinalStatus::Completed => SessionStatus::Completed,
            FinalStatus::Abandoned => SessionStatus::Abandoned,
        }
    }
}

/// Checks the answer count a session needs before it can be completed.
///
/// # Errors
///
/// Returns `SessionModelError::IncompleteAnswers` for any count other than
/// `QUESTIONS_PER_SESSION`.
pub fn ensure_completable(answer_count: usize) -> Result<(), SessionModelError> {
    if answer_count == usize::from(QUESTIONS_PER_SESSION) {
        Ok(())
    } else {
        Err(SessionModelError::IncompleteAnswers {
            expected: QUESTIONS_PER_SESSION,
            found: answer_count,
        })
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One attempt at a ten-question drill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    quiz_type: QuizType,
    difficulty: Difficulty,
    status: SessionStatus,
    score: Option<u8>,
    time_limit_seconds: Option<u32>,
    time_taken_seconds: Option<u32>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Open a new session.
    ///
    /// # Errors
    ///
    /// Returns `SessionModelError::MissingTimeLimit` for hard sessions without
    /// a limit and `SessionModelError::InvalidTimeLimit` for a zero limit.
    pub fn start(
        id: SessionId,
        user_id: UserId,
        quiz_type: QuizType,
        difficulty: Difficulty,
        time_limit_seconds: Option<u32>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionModelError> {
        match time_limit_seconds {
            Some(0) => return Err(SessionModelError::InvalidTimeLimit),
            None if difficulty.requires_time_limit() => {
                return Err(SessionModelError::MissingTimeLimit);
            }
            _ => {}
        }

        Ok(Self {
            id,
            user_id,
            quiz_type,
            difficulty,
            status: SessionStatus::InProgress,
            score: None,
            time_limit_seconds,
            time_taken_seconds: None,
            started_at,
            completed_at: None,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionModelError` if the stored row violates a session invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        quiz_type: QuizType,
        difficulty: Difficulty,
        status: SessionStatus,
        score: Option<u8>,
        time_limit_seconds: Option<u32>,
        time_taken_seconds: Option<u32>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionModelError> {
        if let Some(score) = score.filter(|s| *s > QUESTIONS_PER_SESSION) {
            return Err(SessionModelError::InvalidScore(score));
        }
        if status.is_terminal() && completed_at.is_none() {
            return Err(SessionModelError::MissingCompletion);
        }
        if completed_at.is_some_and(|done| done < started_at) {
            return Err(SessionModelError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            user_id,
            quiz_type,
            difficulty,
            status,
            score,
            time_limit_seconds,
            time_taken_seconds,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn quiz_type(&self) -> QuizType {
        self.quiz_type
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn score(&self) -> Option<u8> {
        self.score
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> Option<u32> {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn time_taken_seconds(&self) -> Option<u32> {
        self.time_taken_seconds
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn belongs_to(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    /// # Errors
    ///
    /// Returns `SessionModelError::NotActive` once the session is terminal.
    pub fn ensure_open(&self) -> Result<(), SessionModelError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionModelError::NotActive {
                status: self.status,
            })
        }
    }

    /// Transition to `Completed` with the given number of correct answers.
    ///
    /// # Errors
    ///
    /// Returns `NotActive` if already finalized, `IncompleteAnswers` unless
    /// exactly `QUESTIONS_PER_SESSION` answers exist, and `InvalidScore` if
    /// `correct` exceeds the answer count.
    pub fn complete(
        &mut self,
        answer_count: usize,
        correct: u8,
        time_taken_seconds: Option<u32>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionModelError> {
        self.ensure_open()?;
        ensure_completable(answer_count)?;
        if usize::from(correct) > answer_count {
            return Err(SessionModelError::InvalidScore(correct));
        }
        if completed_at < self.started_at {
            return Err(SessionModelError::InvalidTimeRange);
        }
        self.status = SessionStatus::Completed;
        self.score = Some(correct);
        self.time_taken_seconds = time_taken_seconds;
        self.completed_at = Some(completed_at);
        Ok(())
    }

    /// Transition to `Abandoned`. The score stays empty.
    ///
    /// # Errors
    ///
    /// Returns `NotActive` if already finalized.
    pub fn abandon(
        &mut self,
        time_taken_seconds: Option<u32>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionModelError> {
        self.ensure_open()?;
        if completed_at < self.started_at {
            return Err(SessionModelError::InvalidTimeRange);
        }
        self.status = SessionStatus::Abandoned;
        self.score = None;
        self.time_taken_seconds = time_taken_seconds;
        self.completed_at = Some(completed_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn open(difficulty: Difficulty, limit: Option<u32>) -> Result<Session, SessionModelError> {
        Session::start(
            SessionId::generate(),
            UserId::new("u1"),
            QuizType::NameNote,
            difficulty,
            limit,
            fixed_now(),
        )
    }

    #[test]
    fn hard_requires_positive_time_limit() {
        assert_eq!(
            open(Difficulty::Hard, None).unwrap_err(),
            SessionModelError::MissingTimeLimit
        );
        assert_eq!(
            open(Difficulty::Hard, Some(0)).unwrap_err(),
            SessionModelError::InvalidTimeLimit
        );
        assert!(open(Difficulty::Hard, Some(60)).is_ok());
        assert!(open(Difficulty::Easy, None).is_ok());
    }

    #[test]
    fn score_cannot_exceed_answer_count() {
        let mut session = open(Difficulty::Easy, None).unwrap();
        let done = fixed_now() + Duration::minutes(2);
        assert_eq!(
            session.complete(10, 11, None, done).unwrap_err(),
            SessionModelError::InvalidScore(11)
        );
        assert!(session.is_open());
        session.complete(10, 10, None, done).unwrap();
        assert_eq!(session.score(), Some(10));
    }

    #[test]
    fn completable_only_with_exactly_ten_answers() {
        assert!(ensure_completable(9).is_err());
        assert!(ensure_completable(10).is_ok());
        assert!(matches!(
            ensure_completable(11),
            Err(SessionModelError::IncompleteAnswers { found: 11, .. })
        ));
    }

    #[test]
    fn complete_sets_score_and_timestamp() {
        let mut session = open(Difficulty::Easy, None).unwrap();
        let done = fixed_now() + Duration::minutes(3);
        session.complete(10, 7, Some(180), done).unwrap();

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.score(), Some(7));
        assert_eq!(session.time_taken_seconds(), Some(180));
        assert_eq!(session.completed_at(), Some(done));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut session = open(Difficulty::Medium, None).unwrap();
        session.abandon(None, fixed_now()).unwrap();
        assert_eq!(session.score(), None);

        let err = session.complete(10, 10, None, fixed_now()).unwrap_err();
        assert_eq!(
            err,
            SessionModelError::NotActive {
                status: SessionStatus::Abandoned
            }
        );
        assert!(session.abandon(None, fixed_now()).is_err());
    }

    #[test]
    fn persisted_terminal_session_needs_completion_time() {
        let err = Session::from_persisted(
            SessionId::generate(),
            UserId::new("u1"),
            QuizType::Intervals,
            Difficulty::Easy,
            SessionStatus::Completed,
            Some(5),
            None,
            None,
            fixed_now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, SessionModelError::MissingCompletion);
    }
}
