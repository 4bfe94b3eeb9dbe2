use std::str::FromStr;

use fret_core::model::{
    Achievement, AchievementGrant, AchievementId, Answer, Criterion, Difficulty, FretPosition,
    Interval, PitchClass, Profile, QuizCounters, QuizType, Session, SessionId, SessionStatus,
    UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, turning uniqueness violations into `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StorageError::Conflict
    } else {
        StorageError::Connection(e.to_string())
    }
}

pub(crate) fn achievement_id_to_i64(id: AchievementId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("achievement_id overflow".into()))
}

pub(crate) fn achievement_id_from_i64(v: i64) -> Result<AchievementId, StorageError> {
    u64::try_from(v)
        .map(AchievementId::new)
        .map_err(|_| StorageError::Serialization("achievement_id sign overflow".into()))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn parse_opt<T: FromStr>(raw: Option<String>) -> Result<Option<T>, StorageError>
where
    T::Err: core::fmt::Display,
{
    raw.map(|s| s.parse::<T>().map_err(ser)).transpose()
}

fn position(
    row: &SqliteRow,
    fret_col: &str,
    string_col: &str,
) -> Result<Option<FretPosition>, StorageError> {
    let fret: Option<i64> = row.try_get(fret_col).map_err(ser)?;
    let string: Option<i64> = row.try_get(string_col).map_err(ser)?;
    match (fret, string) {
        (Some(f), Some(s)) => {
            let pos = FretPosition::new(u8_from_i64("fret", f)?, u8_from_i64("string", s)?)
                .map_err(ser)?;
            Ok(Some(pos))
        }
        (None, None) => Ok(None),
        _ => Err(StorageError::Serialization(format!(
            "half-set position in {fret_col}/{string_col}"
        ))),
    }
}

pub(crate) fn map_profile_row(row: &SqliteRow) -> Result<Profile, StorageError> {
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?);
    let count = |col: &'static str| -> Result<u32, StorageError> {
        u32_from_i64(col, row.try_get::<i64, _>(col).map_err(ser)?)
    };
    let counters = QuizCounters {
        locate_note: count("locate_note_count")?,
        name_note: count("name_note_count")?,
        chord_tones: count("chord_tones_count")?,
        intervals: count("intervals_count")?,
    };

    Profile::from_persisted(
        user_id,
        count("current_streak")?,
        count("longest_streak")?,
        row.try_get("last_activity_date").map_err(ser)?,
        counters,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let id = SessionId::from_str(&row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?);
    let quiz_type: QuizType = row
        .try_get::<String, _>("quiz_type")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let status: SessionStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let score = row
        .try_get::<Option<i64>, _>("score")
        .map_err(ser)?
        .map(|v| u8_from_i64("score", v))
        .transpose()?;
    let time_limit = row
        .try_get::<Option<i64>, _>("time_limit_seconds")
        .map_err(ser)?
        .map(|v| u32_from_i64("time_limit_seconds", v))
        .transpose()?;
    let time_taken = row
        .try_get::<Option<i64>, _>("time_taken_seconds")
        .map_err(ser)?
        .map(|v| u32_from_i64("time_taken_seconds", v))
        .transpose()?;

    Session::from_persisted(
        id,
        user_id,
        quiz_type,
        difficulty,
        status,
        score,
        time_limit,
        time_taken,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<Answer, StorageError> {
    let session_id =
        SessionId::from_str(&row.try_get::<String, _>("session_id").map_err(ser)?).map_err(ser)?;
    let selected_raw: String = row.try_get("selected_positions").map_err(ser)?;
    let selected_positions: Vec<FretPosition> =
        serde_json::from_str(&selected_raw).map_err(ser)?;

    Ok(Answer {
        session_id,
        question_number: u8_from_i64(
            "question_number",
            row.try_get::<i64, _>("question_number").map_err(ser)?,
        )?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        time_taken_ms: row
            .try_get::<Option<i64>, _>("time_taken_ms")
            .map_err(ser)?
            .map(|v| u32_from_i64("time_taken_ms", v))
            .transpose()?,
        target_note: parse_opt::<PitchClass>(row.try_get("target_note").map_err(ser)?)?,
        selected_note: parse_opt::<PitchClass>(row.try_get("selected_note").map_err(ser)?)?,
        target_interval: parse_opt::<Interval>(row.try_get("target_interval").map_err(ser)?)?,
        selected_interval: parse_opt::<Interval>(row.try_get("selected_interval").map_err(ser)?)?,
        target_chord: row.try_get("target_chord").map_err(ser)?,
        chord_root: parse_opt::<PitchClass>(row.try_get("chord_root").map_err(ser)?)?,
        position: position(row, "fret_position", "string_number")?,
        selected_positions,
        reference_position: position(row, "reference_fret", "reference_string")?,
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_achievement_row(row: &SqliteRow) -> Result<Achievement, StorageError> {
    let criteria_raw: String = row.try_get("criteria").map_err(ser)?;
    let criteria: Criterion = serde_json::from_str(&criteria_raw).map_err(ser)?;
    Ok(Achievement {
        id: achievement_id_from_i64(row.try_get("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        criteria,
    })
}

pub(crate) fn map_grant_row(row: &SqliteRow) -> Result<AchievementGrant, StorageError> {
    Ok(AchievementGrant {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        achievement_id: achievement_id_from_i64(row.try_get("achievement_id").map_err(ser)?)?,
        earned_at: row.try_get("earned_at").map_err(ser)?,
    })
}
