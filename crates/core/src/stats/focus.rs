use serde::Serialize;
use thiserror::Error;

use super::heatmap::{HeatmapCell, error_heatmap};
use super::mastery::{NoteAccuracy, note_mastery};
use super::overview::{QuizTypeStats, quiz_type_stats};
use crate::model::{Answer, Session};

const WEAKEST_NOTES: usize = 3;
const HOT_SPOTS: usize = 5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("not enough history: {available} answers recorded, {required} required")]
pub struct InsufficientData {
    pub required: u32,
    pub available: u32,
}

/// Where a learner should spend their next practice session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusAreas {
    pub sample_size: u32,
    /// Lowest accuracy first; only notes that were actually asked.
    pub weakest_notes: Vec<NoteAccuracy>,
    /// Highest error count first.
    pub hot_spots: Vec<HeatmapCell>,
    pub weakest_quiz_type: Option<QuizTypeStats>,
}

/// Pick out weak notes, error-prone positions and the weakest drill mode.
///
/// # Errors
///
/// Returns `InsufficientData` when fewer than `min_answers` answers exist.
pub fn focus_areas(
    answers: &[Answer],
    sessions: &[Session],
    min_answers: u32,
) -> Result<FocusAreas, InsufficientData> {
    let available = u32::try_from(answers.len()).unwrap_or(u32::MAX);
    if available < min_answers {
        return Err(InsufficientData {
            required: min_answers,
            available,
        });
    }

    let mut weakest_notes: Vec<NoteAccuracy> = note_mastery(answers)
        .notes
        .into_iter()
        .filter(|n| n.total > 0)
        .collect();
    weakest_notes.sort_by(|a, b| a.accuracy.cmp(&b.accuracy).then(b.total.cmp(&a.total)));
    weakest_notes.truncate(WEAKEST_NOTES);

    let mut hot_spots = error_heatmap(answers).cells;
    hot_spots.sort_by(|a, b| b.error_count.cmp(&a.error_count));
    hot_spots.truncate(HOT_SPOTS);

    let weakest_quiz_type = quiz_type_stats(sessions)
        .into_iter()
        .filter(|q| q.count > 0)
        .min_by(|a, b| a.average_score.total_cmp(&b.average_score));

    Ok(FocusAreas {
        sample_size: available,
        weakest_notes,
        hot_spots,
        weakest_quiz_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnswerDraft, Difficulty, FretPosition, PitchClass, QuizType, SessionId, SessionStatus,
        UserId,
    };
    use crate::time::fixed_now;

    fn answer(n: u8, correct: bool, note: PitchClass, pos: (u8, u8)) -> Answer {
        AnswerDraft {
            target_note: Some(note),
            position: Some(FretPosition::new(pos.0, pos.1).unwrap()),
            ..AnswerDraft::new(n, correct)
        }
        .validate(SessionId::generate(), fixed_now())
        .unwrap()
    }

    fn completed(quiz_type: QuizType, score: u8) -> Session {
        Session::from_persisted(
            SessionId::generate(),
            UserId::new("u1"),
            quiz_type,
            Difficulty::Easy,
            SessionStatus::Completed,
            Some(score),
            None,
            None,
            fixed_now(),
            Some(fixed_now()),
        )
        .unwrap()
    }

    #[test]
    fn refuses_small_samples() {
        let answers = vec![answer(1, true, PitchClass::C, (8, 6))];
        let err = focus_areas(&answers, &[], 20).unwrap_err();
        assert_eq!(
            err,
            InsufficientData {
                required: 20,
                available: 1
            }
        );
    }

    #[test]
    fn ranks_weak_spots() {
        let mut answers = Vec::new();
        for n in 1..=4 {
            answers.push(answer(n, false, PitchClass::FSharp, (2, 1)));
        }
        for n in 5..=8 {
            answers.push(answer(n, n % 2 == 0, PitchClass::B, (7, 3)));
        }
        for n in 1..=4 {
            answers.push(answer(n, true, PitchClass::E, (0, 1)));
        }
        let sessions = vec![
            completed(QuizType::NameNote, 9),
            completed(QuizType::ChordTones, 4),
        ];

        let focus = focus_areas(&answers, &sessions, 10).unwrap();

        assert_eq!(focus.sample_size, 12);
        let notes: Vec<_> = focus.weakest_notes.iter().map(|n| n.note).collect();
        assert_eq!(notes, vec![PitchClass::FSharp, PitchClass::B, PitchClass::E]);
        assert_eq!(focus.hot_spots[0].error_count, 4);
        assert_eq!((focus.hot_spots[0].fret, focus.hot_spots[0].string), (2, 1));
        assert_eq!(
            focus.weakest_quiz_type.map(|q| q.quiz_type),
            Some(QuizType::ChordTones)
        );
    }
}
