use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::achievements::AchievementService;
use crate::error::AppServicesError;
use crate::sessions::SessionService;
use crate::settings::EngineSettings;
use crate::stats::StatsService;

/// Assembles the engine's services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    settings: EngineSettings,
    sessions: Arc<SessionService>,
    achievements: Arc<AchievementService>,
    stats: Arc<StatsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    /// Build services over an existing `Storage`.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: EngineSettings) -> Self {
        let sessions = Arc::new(SessionService::new(
            clock,
            settings,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.achievements),
            Arc::clone(&storage.finalize),
        ));
        let achievements = Arc::new(AchievementService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.achievements),
        ));
        let stats = Arc::new(StatsService::new(
            clock,
            settings,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.answers),
        ));

        Self {
            settings,
            sessions,
            achievements,
            stats,
        }
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn achievements(&self) -> Arc<AchievementService> {
        Arc::clone(&self.achievements)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }
}
