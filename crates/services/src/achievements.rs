use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fret_core::model::{
    Achievement, AchievementGrant, AchievementProgress, Profile, UserId, default_catalog,
};
use fret_core::progress::{newly_eligible, progress};
use storage::repository::{AchievementRepository, ProfileRepository};

use crate::Clock;
use crate::error::AchievementError;

/// A catalog entry as seen by one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementListItem {
    pub achievement: Achievement,
    pub earned_at: Option<DateTime<Utc>>,
    pub progress: AchievementProgress,
}

/// Catalog upkeep, progress listing and the standalone grant procedure.
#[derive(Clone)]
pub struct AchievementService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    achievements: Arc<dyn AchievementRepository>,
}

impl AchievementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        achievements: Arc<dyn AchievementRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            achievements,
        }
    }

    /// Upsert the built-in catalog by name. Safe to run repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `AchievementError::Storage` on repository failures.
    pub async fn seed_catalog(&self) -> Result<Vec<Achievement>, AchievementError> {
        for entry in default_catalog() {
            self.achievements.upsert_achievement(&entry).await?;
        }
        let catalog = self.achievements.list_achievements().await?;
        tracing::info!(entries = catalog.len(), "achievement catalog seeded");
        Ok(catalog)
    }

    /// Every catalog entry with the learner's progress and earn date.
    ///
    /// # Errors
    ///
    /// Returns `AchievementError::Storage` on repository failures.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AchievementListItem>, AchievementError> {
        let profile = self
            .profiles
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id.clone()));
        let earned: HashMap<_, _> = self
            .achievements
            .grants_for_user(user_id)
            .await?
            .into_iter()
            .map(|g| (g.achievement_id, g.earned_at))
            .collect();

        let items = self
            .achievements
            .list_achievements()
            .await?
            .into_iter()
            .map(|achievement| {
                let earned_at = earned.get(&achievement.id).copied();
                let progress = progress(&achievement.criteria, &profile);
                AchievementListItem {
                    achievement,
                    earned_at,
                    progress,
                }
            })
            .collect();
        Ok(items)
    }

    /// Grant every achievement `profile` and `score` now qualify for.
    ///
    /// `profile` is the learner's state after the session being credited.
    /// Grants already present, including ones inserted by a concurrent call,
    /// are skipped and left out of the result.
    ///
    /// # Errors
    ///
    /// Returns `AchievementError::Storage` on repository failures.
    pub async fn evaluate_and_grant(
        &self,
        user_id: &UserId,
        profile: &Profile,
        score: Option<u8>,
    ) -> Result<Vec<Achievement>, AchievementError> {
        let catalog = self.achievements.list_achievements().await?;
        let earned: HashSet<_> = self
            .achievements
            .grants_for_user(user_id)
            .await?
            .into_iter()
            .map(|g| g.achievement_id)
            .collect();
        let eligible = newly_eligible(&catalog, &earned, profile, score);

        let now = self.clock.now();
        let mut granted = Vec::new();
        for id in eligible {
            let grant = AchievementGrant {
                user_id: user_id.clone(),
                achievement_id: id,
                earned_at: now,
            };
            if self.achievements.insert_grant(&grant).await? {
                granted.push(id);
            }
        }

        let granted: Vec<Achievement> = catalog
            .into_iter()
            .filter(|a| granted.contains(&a.id))
            .collect();
        for achievement in &granted {
            tracing::info!(user_id = %user_id, achievement = %achievement.name, "achievement granted");
        }
        Ok(granted)
    }
}
