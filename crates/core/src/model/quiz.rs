use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a stored or user-supplied enum label is not recognized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {raw}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub raw: String,
}

//
// ─── QUIZ TYPE ─────────────────────────────────────────────────────────────────
//

/// The four drill modes a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    /// Find every position of a named note on the fretboard.
    LocateNote,
    /// Name the note at a highlighted position.
    NameNote,
    /// Mark the tones of a chord.
    ChordTones,
    /// Recognize the interval between two positions.
    Intervals,
}

impl QuizType {
    pub const ALL: [QuizType; 4] = [
        QuizType::LocateNote,
        QuizType::NameNote,
        QuizType::ChordTones,
        QuizType::Intervals,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizType::LocateNote => "locate_note",
            QuizType::NameNote => "name_note",
            QuizType::ChordTones => "chord_tones",
            QuizType::Intervals => "intervals",
        }
    }
}

impl fmt::Display for QuizType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuizType::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "quiz type",
                raw: s.to_owned(),
            })
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    /// Timed; sessions on this difficulty must carry a time limit.
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    #[must_use]
    pub fn requires_time_limit(self) -> bool {
        matches!(self, Difficulty::Hard)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "difficulty",
                raw: s.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_type_labels_round_trip() {
        for quiz in QuizType::ALL {
            assert_eq!(quiz.as_str().parse::<QuizType>().unwrap(), quiz);
        }
        assert!("flashcards".parse::<QuizType>().is_err());
    }

    #[test]
    fn only_hard_requires_time_limit() {
        assert!(!Difficulty::Easy.requires_time_limit());
        assert!(!Difficulty::Medium.requires_time_limit());
        assert!(Difficulty::Hard.requires_time_limit());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&QuizType::ChordTones).unwrap();
        assert_eq!(json, "\"chord_tones\"");
    }
}
