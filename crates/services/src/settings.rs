use chrono::{FixedOffset, Offset, Utc};

use crate::error::SettingsError;

pub const ENV_UTC_OFFSET_MINUTES: &str = "FRETDRILL_UTC_OFFSET_MINUTES";
pub const ENV_MIN_ANALYSIS_ANSWERS: &str = "FRETDRILL_MIN_ANALYSIS_ANSWERS";
pub const ENV_TREND_WINDOW_DAYS: &str = "FRETDRILL_TREND_WINDOW_DAYS";

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Tunables for the session engine and the stats aggregators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Offset of the learner's calendar day from UTC, used for streaks and
    /// date-range filters.
    pub utc_offset_minutes: i32,
    /// Answers required before focus-area analysis runs.
    pub min_analysis_answers: u32,
    pub trend_window_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            min_analysis_answers: 20,
            trend_window_days: 7,
        }
    }
}

impl EngineSettings {
    /// Read overrides from the environment, keeping defaults for unset vars.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a variable is set but unparseable or out of range.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env` with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a variable is set but unparseable or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_UTC_OFFSET_MINUTES) {
            let minutes = parse_number(ENV_UTC_OFFSET_MINUTES, &raw)?;
            if minutes.abs() > i64::from(MAX_OFFSET_MINUTES) {
                return Err(SettingsError::OutOfRange {
                    var: ENV_UTC_OFFSET_MINUTES,
                    value: minutes,
                });
            }
            settings.utc_offset_minutes =
                i32::try_from(minutes).map_err(|_| SettingsError::OutOfRange {
                    var: ENV_UTC_OFFSET_MINUTES,
                    value: minutes,
                })?;
        }
        if let Some(raw) = lookup(ENV_MIN_ANALYSIS_ANSWERS) {
            settings.min_analysis_answers = positive(ENV_MIN_ANALYSIS_ANSWERS, &raw, false)?;
        }
        if let Some(raw) = lookup(ENV_TREND_WINDOW_DAYS) {
            settings.trend_window_days = positive(ENV_TREND_WINDOW_DAYS, &raw, true)?;
        }

        Ok(settings)
    }

    /// The learner's offset from UTC.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<i64, SettingsError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| SettingsError::InvalidNumber {
            var,
            raw: raw.to_owned(),
        })
}

fn positive(var: &'static str, raw: &str, non_zero: bool) -> Result<u32, SettingsError> {
    let value = parse_number(var, raw)?;
    let floor = i64::from(non_zero);
    if value < floor {
        return Err(SettingsError::OutOfRange { var, value });
    }
    u32::try_from(value).map_err(|_| SettingsError::OutOfRange { var, value })
}
