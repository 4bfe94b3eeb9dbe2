use serde::Serialize;

use super::rounded_percent;
use crate::model::{Answer, PitchClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoteAccuracy {
    pub note: PitchClass,
    pub total: u32,
    pub correct: u32,
    /// Whole percent, rounded; 0 when `total` is 0.
    pub accuracy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallAccuracy {
    pub total: u32,
    pub correct: u32,
    pub accuracy: u8,
}

/// Accuracy per pitch class, always listing all twelve in chromatic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteMastery {
    pub notes: Vec<NoteAccuracy>,
    pub overall: OverallAccuracy,
}

impl NoteMastery {
    #[must_use]
    pub fn for_note(&self, note: PitchClass) -> &NoteAccuracy {
        &self.notes[note.index()]
    }
}

/// Tally every answer that recorded a target note, whatever the drill mode.
#[must_use]
pub fn note_mastery<'a>(answers: impl IntoIterator<Item = &'a Answer>) -> NoteMastery {
    let mut totals = [(0_u32, 0_u32); 12];
    for answer in answers {
        let Some(note) = answer.target_note else {
            continue;
        };
        let (total, correct) = &mut totals[note.index()];
        *total = total.saturating_add(1);
        if answer.is_correct {
            *correct = correct.saturating_add(1);
        }
    }

    let notes: Vec<NoteAccuracy> = PitchClass::ALL
        .into_iter()
        .map(|note| {
            let (total, correct) = totals[note.index()];
            NoteAccuracy {
                note,
                total,
                correct,
                accuracy: rounded_percent(correct, total),
            }
        })
        .collect();

    let (total, correct) = notes.iter().fold((0_u32, 0_u32), |(t, c), n| {
        (t.saturating_add(n.total), c.saturating_add(n.correct))
    });

    NoteMastery {
        notes,
        overall: OverallAccuracy {
            total,
            correct,
            accuracy: rounded_percent(correct, total),
        },
    }
}
