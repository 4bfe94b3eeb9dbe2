use fret_core::model::{Achievement, AchievementGrant, AchievementId, NewAchievement, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    achievement_id_from_i64, achievement_id_to_i64, db_err, map_achievement_row, map_grant_row,
    ser,
};
use crate::repository::{AchievementRepository, StorageError};

#[async_trait::async_trait]
impl AchievementRepository for SqliteRepository {
    async fn upsert_achievement(
        &self,
        achievement: &NewAchievement,
    ) -> Result<AchievementId, StorageError> {
        let criteria = serde_json::to_string(&achievement.criteria).map_err(ser)?;

        let row = sqlx::query(
            r"
                INSERT INTO achievements (name, display_name, description, criteria)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(name) DO UPDATE SET
                    display_name = excluded.display_name,
                    description = excluded.description,
                    criteria = excluded.criteria
                RETURNING id
            ",
        )
        .bind(&achievement.name)
        .bind(&achievement.display_name)
        .bind(&achievement.description)
        .bind(criteria)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        achievement_id_from_i64(row.try_get("id").map_err(ser)?)
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, name, display_name, description, criteria
                FROM achievements
                ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_achievement_row(&row)?);
        }
        Ok(out)
    }

    async fn grants_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AchievementGrant>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, achievement_id, earned_at
                FROM user_achievements
                WHERE user_id = ?1
                ORDER BY earned_at, achievement_id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_grant_row(&row)?);
        }
        Ok(out)
    }

    async fn insert_grant(&self, grant: &AchievementGrant) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO user_achievements (user_id, achievement_id, earned_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id, achievement_id) DO NOTHING
            ",
        )
        .bind(grant.user_id.as_str())
        .bind(achievement_id_to_i64(grant.achievement_id)?)
        .bind(grant.earned_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let missing = e
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation());
            if missing {
                StorageError::NotFound
            } else {
                db_err(e)
            }
        })?;

        Ok(res.rows_affected() == 1)
    }
}
