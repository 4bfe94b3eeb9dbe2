use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fret_core::model::{
    Achievement, AchievementGrant, AchievementId, Answer, NewAchievement, Profile, QuizType,
    Session, SessionId, SessionStatus, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("conflict")]
    Conflict,

    /// A guarded write matched no row; the named entity changed underneath.
    #[error("stale write: {0}")]
    StaleWrite(&'static str),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── QUERY FILTERS ─────────────────────────────────────────────────────────────
//

/// Filter for session listings. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub quiz_type: Option<QuizType>,
    /// Inclusive lower bound on `completed_at`.
    pub completed_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `completed_at`.
    pub completed_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl SessionFilter {
    #[must_use]
    pub fn completed() -> Self {
        Self {
            status: Some(SessionStatus::Completed),
            ..Self::default()
        }
    }

    fn matches(&self, session: &Session) -> bool {
        if self.status.is_some_and(|s| s != session.status()) {
            return false;
        }
        if self.quiz_type.is_some_and(|q| q != session.quiz_type()) {
            return false;
        }
        within(
            session.completed_at(),
            self.completed_from,
            self.completed_before,
        )
    }
}

/// Filter for answers drawn from a learner's completed sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerFilter {
    pub quiz_type: Option<QuizType>,
    /// Inclusive lower bound on the session's `completed_at`.
    pub completed_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the session's `completed_at`.
    pub completed_before: Option<DateTime<Utc>>,
}

impl AnswerFilter {
    fn matches(&self, session: &Session) -> bool {
        session.status() == SessionStatus::Completed
            && self.quiz_type.is_none_or(|q| q == session.quiz_type())
            && within(
                session.completed_at(),
                self.completed_from,
                self.completed_before,
            )
    }
}

fn within(
    at: Option<DateTime<Utc>>,
    from: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> bool {
    if from.is_none() && before.is_none() {
        return true;
    }
    let Some(at) = at else {
        return false;
    };
    from.is_none_or(|f| at >= f) && before.is_none_or(|b| at < b)
}

//
// ─── FINALIZE COMMIT ───────────────────────────────────────────────────────────
//

/// Compare-and-swap for the learner profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// The snapshot the update was computed from.
    pub expected: Profile,
    pub next: Profile,
}

/// Everything a finalize call writes, applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeCommit {
    /// The session in its terminal state.
    pub session: Session,
    /// Answer count the session must still have when completing.
    pub expected_answers: Option<usize>,
    pub profile: Option<ProfileUpdate>,
    pub grants: Vec<AchievementId>,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch a profile by user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError>;

    /// Create an empty profile if none exists, then return the stored one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new in-progress session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a session in progress.
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn active_session(&self, user_id: &UserId) -> Result<Option<Session>, StorageError>;

    /// List a user's sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_sessions(
        &self,
        user_id: &UserId,
        filter: &SessionFilter,
    ) -> Result<Vec<Session>, StorageError>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Append an answer to an open session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the question already has an answer,
    /// `StorageError::StaleWrite("session")` if the session is not in progress.
    async fn insert_answer(&self, answer: &Answer) -> Result<(), StorageError>;

    /// Answers for one session in question order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn answers_for_session(&self, session_id: SessionId)
    -> Result<Vec<Answer>, StorageError>;

    /// Answers from the user's completed sessions matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn answers_for_user(
        &self,
        user_id: &UserId,
        filter: &AnswerFilter,
    ) -> Result<Vec<Answer>, StorageError>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Insert or update a catalog entry keyed by `name`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn upsert_achievement(
        &self,
        achievement: &NewAchievement,
    ) -> Result<AchievementId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn grants_for_user(&self, user_id: &UserId)
    -> Result<Vec<AchievementGrant>, StorageError>;

    /// Record a grant. Returns `false` if the pair was already granted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn insert_grant(&self, grant: &AchievementGrant) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait FinalizePersistence: Send + Sync {
    /// Apply a finalize atomically and return the grants that were newly inserted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StaleWrite("session")` if the session is no longer
    /// in progress, `StaleWrite("answers")` if the answer count moved,
    /// `StaleWrite("profile")` if the profile changed since it was read.
    /// Nothing is written on error.
    async fn commit_finalize(
        &self,
        commit: &FinalizeCommit,
    ) -> Result<Vec<AchievementId>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<UserId, Profile>,
    sessions: HashMap<SessionId, Session>,
    answers: HashMap<SessionId, BTreeMap<u8, Answer>>,
    achievements: Vec<Achievement>,
    grants: HashMap<(UserId, AchievementId), AchievementGrant>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one lock so multi-table writes are atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError> {
        Ok(self.lock()?.profiles.get(user_id).cloned())
    }

    async fn ensure_profile(&self, user_id: &UserId) -> Result<Profile, StorageError> {
        let mut guard = self.lock()?;
        Ok(guard
            .profiles
            .entry(user_id.clone())
            .or_insert_with(|| Profile::new(user_id.clone()))
            .clone())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.sessions.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        let has_open = guard
            .sessions
            .values()
            .any(|s| s.is_open() && s.user_id() == session.user_id());
        if session.is_open() && has_open {
            return Err(StorageError::Conflict);
        }
        guard.sessions.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn active_session(&self, user_id: &UserId) -> Result<Option<Session>, StorageError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .find(|s| s.is_open() && s.user_id() == user_id)
            .cloned())
    }

    async fn list_sessions(
        &self,
        user_id: &UserId,
        filter: &SessionFilter,
    ) -> Result<Vec<Session>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Session> = guard
            .sessions
            .values()
            .filter(|s| s.user_id() == user_id && filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        if let Some(limit) = filter.limit {
            out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(out)
    }
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn insert_answer(&self, answer: &Answer) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let open = guard
            .sessions
            .get(&answer.session_id)
            .is_some_and(Session::is_open);
        if !open {
            return Err(StorageError::StaleWrite("session"));
        }
        let slot = guard.answers.entry(answer.session_id).or_default();
        if slot.contains_key(&answer.question_number) {
            return Err(StorageError::Conflict);
        }
        slot.insert(answer.question_number, answer.clone());
        Ok(())
    }

    async fn answers_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Answer>, StorageError> {
        Ok(self
            .lock()?
            .answers
            .get(&session_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn answers_for_user(
        &self,
        user_id: &UserId,
        filter: &AnswerFilter,
    ) -> Result<Vec<Answer>, StorageError> {
        let guard = self.lock()?;
        let mut out = Vec::new();
        for session in guard.sessions.values() {
            if session.user_id() != user_id || !filter.matches(session) {
                continue;
            }
            if let Some(answers) = guard.answers.get(&session.id()) {
                out.extend(answers.values().cloned());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl AchievementRepository for InMemoryRepository {
    async fn upsert_achievement(
        &self,
        achievement: &NewAchievement,
    ) -> Result<AchievementId, StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .achievements
            .iter_mut()
            .find(|a| a.name == achievement.name)
        {
            existing.display_name.clone_from(&achievement.display_name);
            existing.description.clone_from(&achievement.description);
            existing.criteria = achievement.criteria.clone();
            return Ok(existing.id);
        }
        let next = guard
            .achievements
            .iter()
            .map(|a| a.id.value())
            .max()
            .unwrap_or(0)
            + 1;
        let id = AchievementId::new(next);
        guard.achievements.push(Achievement {
            id,
            name: achievement.name.clone(),
            display_name: achievement.display_name.clone(),
            description: achievement.description.clone(),
            criteria: achievement.criteria.clone(),
        });
        Ok(id)
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        Ok(self.lock()?.achievements.clone())
    }

    async fn grants_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AchievementGrant>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .grants
            .values()
            .filter(|g| &g.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|g| (g.earned_at, g.achievement_id));
        Ok(out)
    }

    async fn insert_grant(&self, grant: &AchievementGrant) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if !guard.achievements.iter().any(|a| a.id == grant.achievement_id) {
            return Err(StorageError::NotFound);
        }
        let key = (grant.user_id.clone(), grant.achievement_id);
        if guard.grants.contains_key(&key) {
            return Ok(false);
        }
        guard.grants.insert(key, grant.clone());
        Ok(true)
    }
}

#[async_trait]
impl FinalizePersistence for InMemoryRepository {
    async fn commit_finalize(
        &self,
        commit: &FinalizeCommit,
    ) -> Result<Vec<AchievementId>, StorageError> {
        let mut guard = self.lock()?;
        let session_id = commit.session.id();

        // Validate every guard before touching anything.
        let open = guard.sessions.get(&session_id).is_some_and(Session::is_open);
        if !open {
            return Err(StorageError::StaleWrite("session"));
        }
        if let Some(expected) = commit.expected_answers {
            let found = guard.answers.get(&session_id).map_or(0, BTreeMap::len);
            if found != expected {
                return Err(StorageError::StaleWrite("answers"));
            }
        }
        if let Some(update) = &commit.profile {
            let current = guard
                .profiles
                .get(update.expected.user_id())
                .cloned()
                .unwrap_or_else(|| Profile::new(update.expected.user_id().clone()));
            if current != update.expected {
                return Err(StorageError::StaleWrite("profile"));
            }
        }

        guard.sessions.insert(session_id, commit.session.clone());
        if let Some(update) = &commit.profile {
            guard
                .profiles
                .insert(update.next.user_id().clone(), update.next.clone());
        }

        let user_id = commit.session.user_id().clone();
        let earned_at = commit.session.completed_at().unwrap_or_else(Utc::now);
        let mut granted = Vec::new();
        for id in &commit.grants {
            let key = (user_id.clone(), *id);
            if guard.grants.contains_key(&key) {
                continue;
            }
            guard.grants.insert(
                key,
                AchievementGrant {
                    user_id: user_id.clone(),
                    achievement_id: *id,
                    earned_at,
                },
            );
            granted.push(*id);
        }
        Ok(granted)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub answers: Arc<dyn AnswerRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
    pub finalize: Arc<dyn FinalizePersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one backend across every repository handle.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ProfileRepository
            + SessionRepository
            + AnswerRepository
            + AchievementRepository
            + FinalizePersistence
            + Clone
            + 'static,
    {
        Self {
            profiles: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            answers: Arc::new(repo.clone()),
            achievements: Arc::new(repo.clone()),
            finalize: Arc::new(repo),
        }
    }
}
