use fret_core::model::{Answer, SessionId, SessionStatus, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_answer_row, ser};
use crate::repository::{AnswerFilter, AnswerRepository, StorageError};

const ANSWER_COLUMNS: &str = r"
    a.session_id, a.question_number, a.is_correct, a.time_taken_ms,
    a.target_note, a.selected_note, a.target_interval, a.selected_interval,
    a.target_chord, a.chord_root, a.fret_position, a.string_number,
    a.selected_positions, a.reference_fret, a.reference_string, a.answered_at
";

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn insert_answer(&self, answer: &Answer) -> Result<(), StorageError> {
        let selected = serde_json::to_string(&answer.selected_positions).map_err(ser)?;
        let session_id = answer.session_id.to_string();

        // The row only lands while the session is still open.
        let res = sqlx::query(
            r"
                INSERT INTO answers (
                    session_id, question_number, is_correct, time_taken_ms,
                    target_note, selected_note, target_interval, selected_interval,
                    target_chord, chord_root, fret_position, string_number,
                    selected_positions, reference_fret, reference_string, answered_at
                )
                SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16
                WHERE EXISTS (
                    SELECT 1 FROM sessions WHERE id = ?1 AND status = ?17
                )
            ",
        )
        .bind(&session_id)
        .bind(i64::from(answer.question_number))
        .bind(answer.is_correct)
        .bind(answer.time_taken_ms.map(i64::from))
        .bind(answer.target_note.map(|n| n.as_str()))
        .bind(answer.selected_note.map(|n| n.as_str()))
        .bind(answer.target_interval.map(|i| i.as_str()))
        .bind(answer.selected_interval.map(|i| i.as_str()))
        .bind(answer.target_chord.as_deref())
        .bind(answer.chord_root.map(|n| n.as_str()))
        .bind(answer.position.map(|p| i64::from(p.fret())))
        .bind(answer.position.map(|p| i64::from(p.string())))
        .bind(selected)
        .bind(answer.reference_position.map(|p| i64::from(p.fret())))
        .bind(answer.reference_position.map(|p| i64::from(p.string())))
        .bind(answer.answered_at)
        .bind(SessionStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::StaleWrite("session"));
        }
        Ok(())
    }

    async fn answers_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Answer>, StorageError> {
        let sql = format!(
            "SELECT {ANSWER_COLUMNS} FROM answers a WHERE a.session_id = ?1 ORDER BY a.question_number"
        );
        let rows = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }

    async fn answers_for_user(
        &self,
        user_id: &UserId,
        filter: &AnswerFilter,
    ) -> Result<Vec<Answer>, StorageError> {
        let mut sql = format!(
            r"
                SELECT {ANSWER_COLUMNS}
                FROM answers a
                JOIN sessions s ON s.id = a.session_id
                WHERE s.user_id = ?1 AND s.status = ?2
            "
        );

        let mut bind_index = 3;
        if filter.quiz_type.is_some() {
            sql.push_str(&format!(" AND s.quiz_type = ?{bind_index}"));
            bind_index += 1;
        }
        if filter.completed_from.is_some() {
            sql.push_str(&format!(" AND s.completed_at >= ?{bind_index}"));
            bind_index += 1;
        }
        if filter.completed_before.is_some() {
            sql.push_str(&format!(" AND s.completed_at < ?{bind_index}"));
        }
        sql.push_str(" ORDER BY s.completed_at, a.question_number");

        let mut query = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(SessionStatus::Completed.as_str());
        if let Some(quiz_type) = filter.quiz_type {
            query = query.bind(quiz_type.as_str());
        }
        if let Some(from) = filter.completed_from {
            query = query.bind(from);
        }
        if let Some(before) = filter.completed_before {
            query = query.bind(before);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_answer_row(&row)?);
        }
        Ok(out)
    }
}
