use fret_core::model::{Session, SessionId, SessionStatus, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_session_row};
use crate::repository::{SessionFilter, SessionRepository, StorageError};

pub(crate) const SESSION_COLUMNS: &str = r"
    id, user_id, quiz_type, difficulty, status, score,
    time_limit_seconds, time_taken_seconds, started_at, completed_at
";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO sessions (
                    id, user_id, quiz_type, difficulty, status, score,
                    time_limit_seconds, time_taken_seconds, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(session.id().to_string())
        .bind(session.user_id().as_str())
        .bind(session.quiz_type().as_str())
        .bind(session.difficulty().as_str())
        .bind(session.status().as_str())
        .bind(session.score().map(i64::from))
        .bind(session.time_limit_seconds().map(i64::from))
        .bind(session.time_taken_seconds().map(i64::from))
        .bind(session.started_at())
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn active_session(&self, user_id: &UserId) -> Result<Option<Session>, StorageError> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 AND status = ?2");
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(SessionStatus::InProgress.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn list_sessions(
        &self,
        user_id: &UserId,
        filter: &SessionFilter,
    ) -> Result<Vec<Session>, StorageError> {
        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1");

        let mut bind_index = 2;
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.quiz_type.is_some() {
            sql.push_str(&format!(" AND quiz_type = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.completed_from.is_some() {
            sql.push_str(&format!(" AND completed_at >= ?{bind_index}"));
            bind_index += 1;
        }
        if filter.completed_before.is_some() {
            sql.push_str(&format!(" AND completed_at < ?{bind_index}"));
            bind_index += 1;
        }
        sql.push_str(" ORDER BY started_at DESC, id DESC");
        if filter.limit.is_some() {
            sql.push_str(&format!(" LIMIT ?{bind_index}"));
        }

        let mut query = sqlx::query(&sql).bind(user_id.as_str());
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(quiz_type) = filter.quiz_type {
            query = query.bind(quiz_type.as_str());
        }
        if let Some(from) = filter.completed_from {
            query = query.bind(from);
        }
        if let Some(before) = filter.completed_before {
            query = query.bind(before);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(i64::from(limit));
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }
}
