use chrono::Utc;
use fret_core::model::{Profile, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_profile_row};
use crate::repository::{ProfileRepository, StorageError};

const PROFILE_COLUMNS: &str = r"
    user_id, current_streak, longest_streak, last_activity_date,
    locate_note_count, name_note_count, chord_tones_count, intervals_count
";

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO profiles (user_id, created_at)
                VALUES (?1, ?2)
                ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(user_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 1 {
            tracing::debug!(user = %user_id, "created profile");
        }

        self.get_profile(user_id).await?.ok_or(StorageError::NotFound)
    }
}
