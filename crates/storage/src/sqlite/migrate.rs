use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations that have not been applied yet.
///
/// Version 1 creates profiles, sessions, answers, the achievement catalog and
/// grants, with the indexes the stats queries rely on.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    current_streak INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
                    longest_streak INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= current_streak),
                    last_activity_date TEXT,
                    locate_note_count INTEGER NOT NULL DEFAULT 0 CHECK (locate_note_count >= 0),
                    name_note_count INTEGER NOT NULL DEFAULT 0 CHECK (name_note_count >= 0),
                    chord_tones_count INTEGER NOT NULL DEFAULT 0 CHECK (chord_tones_count >= 0),
                    intervals_count INTEGER NOT NULL DEFAULT 0 CHECK (intervals_count >= 0),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    quiz_type TEXT NOT NULL,
                    difficulty TEXT NOT NULL,
                    status TEXT NOT NULL,
                    score INTEGER CHECK (score BETWEEN 0 AND 10),
                    time_limit_seconds INTEGER CHECK (time_limit_seconds > 0),
                    time_taken_seconds INTEGER CHECK (time_taken_seconds >= 0),
                    started_at TEXT NOT NULL,
                    completed_at TEXT,
                    CHECK (difficulty <> 'hard' OR time_limit_seconds IS NOT NULL),
                    CHECK ((status = 'in_progress') = (completed_at IS NULL))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // At most one open session per learner.
        sqlx::query(
            r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_open
                    ON sessions (user_id) WHERE status = 'in_progress';
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_user_completed
                    ON sessions (user_id, status, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS answers (
                    id INTEGER PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    question_number INTEGER NOT NULL CHECK (question_number BETWEEN 1 AND 10),
                    is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
                    time_taken_ms INTEGER CHECK (time_taken_ms >= 0),
                    target_note TEXT,
                    selected_note TEXT,
                    target_interval TEXT,
                    selected_interval TEXT,
                    target_chord TEXT,
                    chord_root TEXT,
                    fret_position INTEGER CHECK (fret_position BETWEEN 0 AND 24),
                    string_number INTEGER CHECK (string_number BETWEEN 1 AND 6),
                    selected_positions TEXT NOT NULL DEFAULT '[]',
                    reference_fret INTEGER CHECK (reference_fret BETWEEN 0 AND 24),
                    reference_string INTEGER CHECK (reference_string BETWEEN 1 AND 6),
                    answered_at TEXT NOT NULL,
                    UNIQUE (session_id, question_number),
                    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS achievements (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    criteria TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_achievements (
                    user_id TEXT NOT NULL,
                    achievement_id INTEGER NOT NULL,
                    earned_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, achievement_id),
                    FOREIGN KEY (achievement_id) REFERENCES achievements(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
