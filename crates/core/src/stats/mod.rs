//! Read-side reducers over a learner's answer and session history.
//!
//! Inputs are already scoped to one user (and any filters) by the storage
//! query; the reducers only fold.

mod focus;
mod heatmap;
mod mastery;
mod overview;

pub use focus::{FocusAreas, InsufficientData, focus_areas};
pub use heatmap::{Heatmap, HeatmapCell, error_heatmap};
pub use mastery::{NoteAccuracy, NoteMastery, OverallAccuracy, note_mastery};
pub use overview::{
    DifficultyStats, Overview, QuizTypeStats, Trend, overview, quiz_type_stats, trend,
};

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `round(part / whole * 100)` as a whole percentage; 0 when `whole` is 0.
#[must_use]
pub fn rounded_percent(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part.min(whole)), u64::from(whole));
    u8::try_from((part * 200 + whole) / (2 * whole)).unwrap_or(100)
}
