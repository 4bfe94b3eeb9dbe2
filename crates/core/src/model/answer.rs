use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::model::note::{FretPosition, Interval, PitchClass};
use crate::model::session::QUESTIONS_PER_SESSION;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question number must be between 1 and {QUESTIONS_PER_SESSION}, got {0}")]
    InvalidQuestionNumber(u8),

    #[error("chord symbol cannot be empty")]
    EmptyChord,
}

//
// ─── DRAFT ────────────────────────────────────────────────────────────────────
//

/// Answer payload as submitted by the client, before validation.
///
/// Only the fields relevant to the drill mode are expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnswerDraft {
    pub question_number: u8,
    pub is_correct: bool,
    #[serde(default)]
    pub time_taken_ms: Option<u32>,
    #[serde(default)]
    pub target_note: Option<PitchClass>,
    #[serde(default)]
    pub selected_note: Option<PitchClass>,
    #[serde(default)]
    pub target_interval: Option<Interval>,
    #[serde(default)]
    pub selected_interval: Option<Interval>,
    #[serde(default)]
    pub target_chord: Option<String>,
    #[serde(default)]
    pub chord_root: Option<PitchClass>,
    #[serde(default)]
    pub position: Option<FretPosition>,
    #[serde(default)]
    pub selected_positions: Vec<FretPosition>,
    #[serde(default)]
    pub reference_position: Option<FretPosition>,
}

impl AnswerDraft {
    #[must_use]
    pub fn new(question_number: u8, is_correct: bool) -> Self {
        Self {
            question_number,
            is_correct,
            ..Self::default()
        }
    }

    /// Validate the draft and bind it to a session.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if the question number is out of range or a chord
    /// symbol is blank.
    pub fn validate(
        self,
        session_id: SessionId,
        answered_at: DateTime<Utc>,
    ) -> Result<Answer, AnswerError> {
        if self.question_number == 0 || self.question_number > QUESTIONS_PER_SESSION {
            return Err(AnswerError::InvalidQuestionNumber(self.question_number));
        }
        let target_chord = match self.target_chord {
            Some(chord) => {
                let trimmed = chord.trim();
                if trimmed.is_empty() {
                    return Err(AnswerError::EmptyChord);
                }
                Some(trimmed.to_owned())
            }
            None => None,
        };

        Ok(Answer {
            session_id,
            question_number: self.question_number,
            is_correct: self.is_correct,
            time_taken_ms: self.time_taken_ms,
            target_note: self.target_note,
            selected_note: self.selected_note,
            target_interval: self.target_interval,
            selected_interval: self.selected_interval,
            target_chord,
            chord_root: self.chord_root,
            position: self.position,
            selected_positions: self.selected_positions,
            reference_position: self.reference_position,
            answered_at,
        })
    }
}

//
// ─── ANSWER ───────────────────────────────────────────────────────────────────
//

/// One recorded answer. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub session_id: SessionId,
    pub question_number: u8,
    pub is_correct: bool,
    pub time_taken_ms: Option<u32>,
    pub target_note: Option<PitchClass>,
    pub selected_note: Option<PitchClass>,
    pub target_interval: Option<Interval>,
    pub selected_interval: Option<Interval>,
    pub target_chord: Option<String>,
    pub chord_root: Option<PitchClass>,
    pub position: Option<FretPosition>,
    pub selected_positions: Vec<FretPosition>,
    pub reference_position: Option<FretPosition>,
    pub answered_at: DateTime<Utc>,
}

/// Number of correct answers, i.e. the session score.
#[must_use]
pub fn count_correct(answers: &[Answer]) -> u8 {
    let correct = answers.iter().filter(|a| a.is_correct).count();
    u8::try_from(correct).unwrap_or(u8::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn question_number_must_be_in_range() {
        let sid = SessionId::generate();
        for bad in [0, 11, 255] {
            let err = AnswerDraft::new(bad, true)
                .validate(sid, fixed_now())
                .unwrap_err();
            assert_eq!(err, AnswerError::InvalidQuestionNumber(bad));
        }
        assert!(AnswerDraft::new(1, true).validate(sid, fixed_now()).is_ok());
        assert!(AnswerDraft::new(10, false).validate(sid, fixed_now()).is_ok());
    }

    #[test]
    fn blank_chord_is_rejected() {
        let draft = AnswerDraft {
            target_chord: Some("  ".into()),
            ..AnswerDraft::new(3, true)
        };
        assert_eq!(
            draft.validate(SessionId::generate(), fixed_now()).unwrap_err(),
            AnswerError::EmptyChord
        );
    }

    #[test]
    fn counts_correct_answers() {
        let sid = SessionId::generate();
        let answers: Vec<Answer> = (1..=10)
            .map(|n| {
                AnswerDraft::new(n, n % 2 == 0)
                    .validate(sid, fixed_now())
                    .unwrap()
            })
            .collect();
        assert_eq!(count_correct(&answers), 5);
    }

    #[test]
    fn draft_deserializes_with_defaults() {
        let draft: AnswerDraft = serde_json::from_str(
            r#"{"question_number": 2, "is_correct": false, "target_note": "F#",
                "position": {"fret": 2, "string": 1}}"#,
        )
        .unwrap();
        assert_eq!(draft.target_note, Some(PitchClass::FSharp));
        assert_eq!(draft.position, Some(FretPosition::new(2, 1).unwrap()));
        assert!(draft.selected_positions.is_empty());
    }

    #[test]
    fn draft_accepts_flat_note_names() {
        let draft: AnswerDraft = serde_json::from_str(
            r#"{"question_number": 3, "is_correct": true, "target_note": "Db",
                "selected_note": "Bb", "chord_root": "Gb"}"#,
        )
        .unwrap();
        assert_eq!(draft.target_note, Some(PitchClass::CSharp));
        assert_eq!(draft.selected_note, Some(PitchClass::ASharp));
        assert_eq!(draft.chord_root, Some(PitchClass::FSharp));
    }
}
