//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use fret_core::model::{AnswerError, ProfileError, SessionModelError};
use fret_core::stats::InsufficientData;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Stable, caller-facing classification of every service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    SessionConflict,
    SessionNotActive,
    DuplicateAnswer,
    AlreadyFinalized,
    IncompleteAnswers,
    InsufficientData,
    ServerError,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::SessionConflict => "session_conflict",
            ErrorKind::SessionNotActive => "session_not_active",
            ErrorKind::DuplicateAnswer => "duplicate_answer",
            ErrorKind::AlreadyFinalized => "already_finalized",
            ErrorKind::IncompleteAnswers => "incomplete_answers",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::ServerError,
    }
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session belongs to another user")]
    Forbidden,
    #[error("user already has a session in progress")]
    Conflict,
    #[error("question {0} already answered")]
    DuplicateAnswer(u8),
    #[error("session already finalized")]
    AlreadyFinalized,
    #[error("session answers changed during finalize")]
    AnswersChanged,
    #[error("profile changed concurrently")]
    ProfileChanged,
    #[error(transparent)]
    Model(#[from] SessionModelError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::NotFound => ErrorKind::NotFound,
            SessionError::Forbidden => ErrorKind::Forbidden,
            SessionError::Conflict => ErrorKind::SessionConflict,
            SessionError::DuplicateAnswer(_) => ErrorKind::DuplicateAnswer,
            SessionError::AlreadyFinalized => ErrorKind::AlreadyFinalized,
            SessionError::AnswersChanged => ErrorKind::IncompleteAnswers,
            SessionError::Model(err) => match err {
                SessionModelError::NotActive { .. } => ErrorKind::SessionNotActive,
                SessionModelError::IncompleteAnswers { .. } => ErrorKind::IncompleteAnswers,
                SessionModelError::MissingCompletion => ErrorKind::ServerError,
                _ => ErrorKind::Validation,
            },
            SessionError::Answer(_) => ErrorKind::Validation,
            SessionError::ProfileChanged | SessionError::Profile(_) => ErrorKind::ServerError,
            SessionError::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `AchievementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AchievementError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AchievementError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AchievementError::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error("date range starts after it ends")]
    InvalidRange,
    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StatsError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatsError::InvalidRange => ErrorKind::Validation,
            StatsError::InsufficientData(_) => ErrorKind::InsufficientData,
            StatsError::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors emitted while reading `EngineSettings` from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("{var} is not a valid number: {raw}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} is out of range: {value}")]
    OutOfRange { var: &'static str, value: i64 },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppServicesError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppServicesError::Settings(_) => ErrorKind::Validation,
            AppServicesError::Sqlite(_) => ErrorKind::ServerError,
            AppServicesError::Storage(err) => storage_kind(err),
        }
    }
}
