use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Answer;

/// Error count at one fretboard position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub fret: u8,
    pub string: u8,
    pub error_count: u32,
}

/// Incorrect answers grouped by fretboard position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Heatmap {
    /// Ordered by fret, then string.
    pub cells: Vec<HeatmapCell>,
    pub max_error_count: u32,
    pub total_errors: u32,
}

impl Heatmap {
    #[must_use]
    pub fn count_at(&self, fret: u8, string: u8) -> u32 {
        self.cells
            .iter()
            .find(|c| c.fret == fret && c.string == string)
            .map_or(0, |c| c.error_count)
    }
}

/// Count incorrect answers per `(fret, string)`.
///
/// Answers without a recorded position do not contribute.
#[must_use]
pub fn error_heatmap<'a>(answers: impl IntoIterator<Item = &'a Answer>) -> Heatmap {
    let mut counts: BTreeMap<(u8, u8), u32> = BTreeMap::new();
    for answer in answers {
        if answer.is_correct {
            continue;
        }
        if let Some(pos) = answer.position {
            let slot = counts.entry((pos.fret(), pos.string())).or_insert(0);
            *slot = slot.saturating_add(1);
        }
    }

    let cells: Vec<HeatmapCell> = counts
        .into_iter()
        .map(|((fret, string), error_count)| HeatmapCell {
            fret,
            string,
            error_count,
        })
        .collect();
    let max_error_count = cells.iter().map(|c| c.error_count).max().unwrap_or(0);
    let total_errors = cells
        .iter()
        .fold(0_u32, |acc, c| acc.saturating_add(c.error_count));

    Heatmap {
        cells,
        max_error_count,
        total_errors,
    }
}
