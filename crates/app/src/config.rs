use std::path::{Path, PathBuf};

use fret_core::model::UserId;

use crate::cli::{ArgsError, GlobalArgs};

pub const ENV_DB_URL: &str = "FRETDRILL_DB_URL";
pub const ENV_USER: &str = "FRETDRILL_USER";

const DEFAULT_DB_URL: &str = "sqlite://fretdrill.sqlite3";
const DEFAULT_USER: &str = "local";

/// Resolved runtime configuration for the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub user_id: UserId,
}

impl AppConfig {
    /// Merge CLI flags over environment variables over defaults.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError::Invalid` for a blank user id.
    pub fn resolve(global: &GlobalArgs) -> Result<Self, ArgsError> {
        Self::resolve_with(global, |var| std::env::var(var).ok())
    }

    fn resolve_with<F>(global: &GlobalArgs, lookup: F) -> Result<Self, ArgsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_url = global
            .db_url
            .clone()
            .or_else(|| lookup(ENV_DB_URL))
            .filter(|raw| !raw.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.to_owned(), normalize_sqlite_url);

        let raw_user = global
            .user
            .clone()
            .or_else(|| lookup(ENV_USER))
            .unwrap_or_else(|| DEFAULT_USER.to_owned());
        let user_id = raw_user.parse::<UserId>().map_err(|_| ArgsError::Invalid {
            flag: "--user",
            raw: raw_user.clone(),
        })?;

        Ok(Self { db_url, user_id })
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created, or
/// `ArgsError::Invalid` if the URL has no path.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::Invalid {
        flag: "--db",
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
