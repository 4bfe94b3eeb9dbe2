use chrono::Utc;
use fret_core::model::{AchievementId, SessionStatus};

use super::SqliteRepository;
use super::mapping::{achievement_id_to_i64, db_err};
use crate::repository::{FinalizeCommit, FinalizePersistence, StorageError};

#[async_trait::async_trait]
impl FinalizePersistence for SqliteRepository {
    async fn commit_finalize(
        &self,
        commit: &FinalizeCommit,
    ) -> Result<Vec<AchievementId>, StorageError> {
        let session = &commit.session;
        let session_id = session.id().to_string();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Writing first takes the database write lock, so two finalizers of
        // the same session serialize here and the loser sees zero rows.
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET status = ?1, score = ?2, time_taken_seconds = ?3, completed_at = ?4
                WHERE id = ?5 AND status = ?6
            ",
        )
        .bind(session.status().as_str())
        .bind(session.score().map(i64::from))
        .bind(session.time_taken_seconds().map(i64::from))
        .bind(session.completed_at())
        .bind(&session_id)
        .bind(SessionStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::StaleWrite("session"));
        }

        if let Some(expected) = commit.expected_answers {
            let found: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE session_id = ?1")
                    .bind(&session_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;
            if usize::try_from(found).ok() != Some(expected) {
                return Err(StorageError::StaleWrite("answers"));
            }
        }

        if let Some(update) = &commit.profile {
            let old = &update.expected;
            let next = &update.next;
            let res = sqlx::query(
                r"
                    UPDATE profiles
                    SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3,
                        locate_note_count = ?4, name_note_count = ?5,
                        chord_tones_count = ?6, intervals_count = ?7
                    WHERE user_id = ?8
                      AND current_streak = ?9 AND longest_streak = ?10
                      AND last_activity_date IS ?11
                      AND locate_note_count = ?12 AND name_note_count = ?13
                      AND chord_tones_count = ?14 AND intervals_count = ?15
                ",
            )
            .bind(i64::from(next.current_streak()))
            .bind(i64::from(next.longest_streak()))
            .bind(next.last_activity_date())
            .bind(i64::from(next.counters().locate_note))
            .bind(i64::from(next.counters().name_note))
            .bind(i64::from(next.counters().chord_tones))
            .bind(i64::from(next.counters().intervals))
            .bind(old.user_id().as_str())
            .bind(i64::from(old.current_streak()))
            .bind(i64::from(old.longest_streak()))
            .bind(old.last_activity_date())
            .bind(i64::from(old.counters().locate_note))
            .bind(i64::from(old.counters().name_note))
            .bind(i64::from(old.counters().chord_tones))
            .bind(i64::from(old.counters().intervals))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if res.rows_affected() == 0 {
                return Err(StorageError::StaleWrite("profile"));
            }
        }

        let earned_at = session.completed_at().unwrap_or_else(Utc::now);
        let mut granted = Vec::new();
        for id in &commit.grants {
            let res = sqlx::query(
                r"
                    INSERT INTO user_achievements (user_id, achievement_id, earned_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(user_id, achievement_id) DO NOTHING
                ",
            )
            .bind(session.user_id().as_str())
            .bind(achievement_id_to_i64(*id)?)
            .bind(earned_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if res.rows_affected() == 1 {
                granted.push(*id);
            }
        }

        tx.commit().await.map_err(db_err)?;

        tracing::debug!(
            session = %session.id(),
            status = session.status().as_str(),
            granted = granted.len(),
            "finalize committed"
        );
        Ok(granted)
    }
}
