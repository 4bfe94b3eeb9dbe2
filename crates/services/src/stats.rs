use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use fret_core::model::{Profile, QuizType, UserId};
use fret_core::stats::{self, FocusAreas, Heatmap, NoteMastery, Overview};
use storage::repository::{
    AnswerFilter, AnswerRepository, ProfileRepository, SessionFilter, SessionRepository,
};

use crate::Clock;
use crate::error::StatsError;
use crate::settings::EngineSettings;

/// Optional narrowing of the error heatmap.
///
/// Dates are learner-local calendar days and both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatmapFilter {
    pub quiz_type: Option<QuizType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl HeatmapFilter {
    fn to_answer_filter(self, offset: FixedOffset) -> Result<AnswerFilter, StatsError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(StatsError::InvalidRange);
            }
        }
        let completed_from = self
            .from
            .map(|day| local_midnight(day, offset))
            .transpose()?;
        let completed_before = self
            .to
            .map(|day| {
                day.succ_opt()
                    .ok_or(StatsError::InvalidRange)
                    .and_then(|next| local_midnight(next, offset))
            })
            .transpose()?;

        Ok(AnswerFilter {
            quiz_type: self.quiz_type,
            completed_from,
            completed_before,
        })
    }
}

fn local_midnight(day: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, StatsError> {
    let naive = day.and_hms_opt(0, 0, 0).ok_or(StatsError::InvalidRange)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(StatsError::InvalidRange)
}

/// Read-only aggregations over a learner's history.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    settings: EngineSettings,
    profiles: Arc<dyn ProfileRepository>,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl StatsService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<dyn SessionRepository>,
        answers: Arc<dyn AnswerRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            profiles,
            sessions,
            answers,
        }
    }

    /// Incorrect answers per fret position.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::InvalidRange` for a reversed date range and
    /// `StatsError::Storage` on repository failures.
    pub async fn heatmap(
        &self,
        user_id: &UserId,
        filter: HeatmapFilter,
    ) -> Result<Heatmap, StatsError> {
        let answer_filter = filter.to_answer_filter(self.settings.utc_offset())?;
        let answers = self.answers.answers_for_user(user_id, &answer_filter).await?;
        let heatmap = stats::error_heatmap(&answers);
        tracing::debug!(
            user_id = %user_id,
            answers = answers.len(),
            total_errors = heatmap.total_errors,
            "heatmap built"
        );
        Ok(heatmap)
    }

    /// Accuracy per pitch class over all completed sessions.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` on repository failures.
    pub async fn note_mastery(&self, user_id: &UserId) -> Result<NoteMastery, StatsError> {
        let answers = self
            .answers
            .answers_for_user(user_id, &AnswerFilter::default())
            .await?;
        Ok(stats::note_mastery(&answers))
    }

    /// Lifetime totals, per-type and per-difficulty breakdowns, and the trend.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` on repository failures.
    pub async fn overview(&self, user_id: &UserId) -> Result<Overview, StatsError> {
        let profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id.clone()));
        let sessions = self
            .sessions
            .list_sessions(user_id, &SessionFilter::completed())
            .await?;
        Ok(stats::overview(
            &sessions,
            &profile,
            self.clock.now(),
            self.settings.trend_window_days,
        ))
    }

    /// Weakest notes, worst positions and weakest drill mode.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::InsufficientData` below the configured sample
    /// size and `StatsError::Storage` on repository failures.
    pub async fn focus_areas(&self, user_id: &UserId) -> Result<FocusAreas, StatsError> {
        let answers = self
            .answers
            .answers_for_user(user_id, &AnswerFilter::default())
            .await?;
        let sessions = self
            .sessions
            .list_sessions(user_id, &SessionFilter::completed())
            .await?;
        let focus = stats::focus_areas(&answers, &sessions, self.settings.min_analysis_answers)
            .inspect_err(|err| {
                tracing::debug!(user_id = %user_id, %err, "focus analysis skipped");
            })?;
        Ok(focus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fret_core::time::fixed_now;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_range_is_inclusive_of_the_last_day() {
        let filter = HeatmapFilter {
            quiz_type: Some(QuizType::LocateNote),
            from: Some(day(2024, 2, 28)),
            to: Some(day(2024, 2, 29)),
        };
        let utc = FixedOffset::east_opt(0).unwrap();
        let answer_filter = filter.to_answer_filter(utc).unwrap();

        let from = answer_filter.completed_from.unwrap();
        let before = answer_filter.completed_before.unwrap();
        assert_eq!(from.to_rfc3339(), "2024-02-28T00:00:00+00:00");
        assert_eq!(before.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(answer_filter.quiz_type, Some(QuizType::LocateNote));
    }

    #[test]
    fn local_days_shift_with_the_offset() {
        let filter = HeatmapFilter {
            from: Some(day(2024, 1, 1)),
            ..HeatmapFilter::default()
        };
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let answer_filter = filter.to_answer_filter(plus_two).unwrap();
        assert_eq!(
            answer_filter.completed_from.unwrap().to_rfc3339(),
            "2023-12-31T22:00:00+00:00"
        );
        assert!(answer_filter.completed_before.is_none());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let filter = HeatmapFilter {
            from: Some(day(2024, 3, 2)),
            to: Some(day(2024, 3, 1)),
            ..HeatmapFilter::default()
        };
        let utc = FixedOffset::east_opt(0).unwrap();
        assert!(matches!(
            filter.to_answer_filter(utc),
            Err(StatsError::InvalidRange)
        ));
    }

    #[test]
    fn filter_window_covers_a_whole_day() {
        let today = fixed_now().date_naive();
        let filter = HeatmapFilter {
            from: Some(today),
            to: Some(today),
            ..HeatmapFilter::default()
        };
        let utc = FixedOffset::east_opt(0).unwrap();
        let f = filter.to_answer_filter(utc).unwrap();
        let span = f.completed_before.unwrap() - f.completed_from.unwrap();
        assert_eq!(span, Duration::days(1));
    }
}
