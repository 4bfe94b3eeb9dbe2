use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use fret_core::model::{
    Answer, AnswerDraft, Difficulty, FinalStatus, Profile, QuizType, Session, SessionId,
    SessionModelError, UserId, count_correct,
};
use fret_core::progress::newly_eligible;
use storage::repository::{
    AchievementRepository, AnswerRepository, FinalizeCommit, FinalizePersistence,
    ProfileRepository, ProfileUpdate, SessionFilter, SessionRepository, StorageError,
};

use super::view::{FinalizeOutcome, SessionDetail};
use crate::Clock;
use crate::error::SessionError;
use crate::settings::EngineSettings;

/// Drives a session from creation through answers to finalization.
///
/// Every mutation is guarded in storage as well as here: uniqueness
/// constraints decide races, this service only translates their outcome.
#[derive(Clone)]
pub struct SessionService {
    clock: Clock,
    settings: EngineSettings,
    profiles: Arc<dyn ProfileRepository>,
    sessions: Arc<dyn SessionRepository>,
    answers: Arc<dyn AnswerRepository>,
    achievements: Arc<dyn AchievementRepository>,
    finalizer: Arc<dyn FinalizePersistence>,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        profiles: Arc<dyn ProfileRepository>,
        sessions: Arc<dyn SessionRepository>,
        answers: Arc<dyn AnswerRepository>,
        achievements: Arc<dyn AchievementRepository>,
        finalizer: Arc<dyn FinalizePersistence>,
    ) -> Self {
        Self {
            clock,
            settings,
            profiles,
            sessions,
            answers,
            achievements,
            finalizer,
        }
    }

    /// Parse a caller-supplied session id. Unparseable ids are reported as
    /// `NotFound`, the same as ids that do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if `raw` is not a session id.
    pub fn resolve_id(raw: &str) -> Result<SessionId, SessionError> {
        SessionId::from_str(raw).map_err(|_| SessionError::NotFound)
    }

    /// Open a new session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a hard session without a positive time
    /// limit and `SessionError::Conflict` if the user already has an open session.
    pub async fn create_session(
        &self,
        user_id: &UserId,
        quiz_type: QuizType,
        difficulty: Difficulty,
        time_limit_seconds: Option<u32>,
    ) -> Result<Session, SessionError> {
        let session = Session::start(
            SessionId::generate(),
            user_id.clone(),
            quiz_type,
            difficulty,
            time_limit_seconds,
            self.clock.now(),
        )?;
        self.profiles.ensure_profile(user_id).await?;

        match self.sessions.insert_session(&session).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                tracing::warn!(user_id = %user_id, "session already in progress");
                return Err(SessionError::Conflict);
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            user_id = %user_id,
            session_id = %session.id(),
            quiz_type = quiz_type.as_str(),
            difficulty = difficulty.as_str(),
            "session started"
        );
        Ok(session)
    }

    /// Append one answer to an open session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, a `NotActive` model error once the
    /// session is finalized, `DuplicateAnswer` for a repeated question, or a
    /// validation error for a malformed answer.
    pub async fn record_answer(
        &self,
        user_id: &UserId,
        session_id: SessionId,
        draft: AnswerDraft,
    ) -> Result<Answer, SessionError> {
        let session = self.owned_session(user_id, session_id).await?;
        session.ensure_open()?;

        let question = draft.question_number;
        let answer = draft.validate(session_id, self.clock.now())?;

        match self.answers.insert_answer(&answer).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                tracing::warn!(session_id = %session_id, question, "duplicate answer");
                return Err(SessionError::DuplicateAnswer(question));
            }
            Err(StorageError::StaleWrite(_)) => {
                // Finalized between the read above and the insert.
                let status = self
                    .sessions
                    .get_session(session_id)
                    .await?
                    .map_or(session.status(), |s| s.status());
                return Err(SessionModelError::NotActive { status }.into());
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            session_id = %session_id,
            question,
            correct = answer.is_correct,
            "answer recorded"
        );
        Ok(answer)
    }

    /// Close a session as completed or abandoned.
    ///
    /// Completing scores the session, advances the learner's streak and
    /// counters, and grants newly met achievements in a single commit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Forbidden`, `AlreadyFinalized`, or an
    /// `IncompleteAnswers` model error unless exactly ten answers exist.
    /// Nothing is written when an error is returned.
    pub async fn finalize(
        &self,
        user_id: &UserId,
        session_id: SessionId,
        status: FinalStatus,
        time_taken_seconds: Option<u32>,
    ) -> Result<FinalizeOutcome, SessionError> {
        let mut session = self.owned_session(user_id, session_id).await?;
        if !session.is_open() {
            return Err(SessionError::AlreadyFinalized);
        }
        let now = self.clock.now();

        let (commit, catalog) = match status {
            FinalStatus::Abandoned => {
                session.abandon(time_taken_seconds, now)?;
                let commit = FinalizeCommit {
                    session: session.clone(),
                    expected_answers: None,
                    profile: None,
                    grants: Vec::new(),
                };
                (commit, Vec::new())
            }
            FinalStatus::Completed => {
                let answers = self.answers.answers_for_session(session_id).await?;
                let score = count_correct(&answers);
                session.complete(answers.len(), score, time_taken_seconds, now)?;

                let profile = self.profiles.ensure_profile(user_id).await?;
                let today = self.clock.today(self.settings.utc_offset());
                let next = profile.after_completion(session.quiz_type(), today);

                let catalog = self.achievements.list_achievements().await?;
                let earned: HashSet<_> = self
                    .achievements
                    .grants_for_user(user_id)
                    .await?
                    .into_iter()
                    .map(|g| g.achievement_id)
                    .collect();
                let grants = newly_eligible(&catalog, &earned, &next, Some(score));

                let commit = FinalizeCommit {
                    session: session.clone(),
                    expected_answers: Some(answers.len()),
                    profile: Some(ProfileUpdate {
                        expected: profile,
                        next,
                    }),
                    grants,
                };
                (commit, catalog)
            }
        };

        let granted_ids = self
            .finalizer
            .commit_finalize(&commit)
            .await
            .map_err(|err| stale_to_session_error(err, session_id))?;

        // Committed: resolve grants from the catalog already in hand.
        let ids: HashSet<_> = granted_ids.into_iter().collect();
        let granted: Vec<_> = catalog
            .into_iter()
            .filter(|a| ids.contains(&a.id))
            .collect();

        tracing::info!(
            user_id = %user_id,
            session_id = %session_id,
            status = session.status().as_str(),
            score = ?session.score(),
            granted = granted.len(),
            "session finalized"
        );
        for achievement in &granted {
            tracing::info!(user_id = %user_id, achievement = %achievement.name, "achievement granted");
        }

        Ok(FinalizeOutcome { session, granted })
    }

    /// A session owned by `user_id`, with its answers in question order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Forbidden`.
    pub async fn get_session(
        &self,
        user_id: &UserId,
        session_id: SessionId,
    ) -> Result<SessionDetail, SessionError> {
        let session = self.owned_session(user_id, session_id).await?;
        let answers = self.answers.answers_for_session(session_id).await?;
        Ok(SessionDetail { session, answers })
    }

    /// The user's open session, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn active_session(&self, user_id: &UserId) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.active_session(user_id).await?)
    }

    /// Newest-first session history.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn recent_sessions(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Session>, SessionError> {
        let filter = SessionFilter {
            limit: Some(limit),
            ..SessionFilter::default()
        };
        Ok(self.sessions.list_sessions(user_id, &filter).await?)
    }

    /// The learner's profile, or an empty one if they have never played.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn profile(&self, user_id: &UserId) -> Result<Profile, SessionError> {
        Ok(self
            .profiles
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id.clone())))
    }

    async fn owned_session(
        &self,
        user_id: &UserId,
        session_id: SessionId,
    ) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(SessionError::NotFound)?;
        if !session.belongs_to(user_id) {
            tracing::warn!(user_id = %user_id, session_id = %session_id, "foreign session");
            return Err(SessionError::Forbidden);
        }
        Ok(session)
    }
}

fn stale_to_session_error(err: StorageError, session_id: SessionId) -> SessionError {
    match err {
        StorageError::StaleWrite("session") => {
            tracing::warn!(session_id = %session_id, "finalize lost race");
            SessionError::AlreadyFinalized
        }
        StorageError::StaleWrite("answers") => SessionError::AnswersChanged,
        StorageError::StaleWrite("profile") => SessionError::ProfileChanged,
        other => SessionError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fret_core::model::{Criterion, NewAchievement, SessionStatus};
    use fret_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, Storage};

    use crate::error::ErrorKind;

    fn service(storage: &Storage) -> SessionService {
        SessionService::new(
            Clock::fixed(fixed_now()),
            EngineSettings::default(),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.answers),
            Arc::clone(&storage.achievements),
            Arc::clone(&storage.finalize),
        )
    }

    async fn answer_all(svc: &SessionService, user: &UserId, id: SessionId, correct: u8) {
        for n in 1..=10 {
            svc.record_answer(user, id, AnswerDraft::new(n, n <= correct))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn hard_sessions_need_a_time_limit() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = UserId::new("u1");

        let err = svc
            .create_session(&user, QuizType::Intervals, Difficulty::Hard, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let session = svc
            .create_session(&user, QuizType::Intervals, Difficulty::Hard, Some(60))
            .await
            .unwrap();
        assert_eq!(session.time_limit_seconds(), Some(60));
    }

    #[tokio::test]
    async fn second_open_session_conflicts() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = UserId::new("u1");

        svc.create_session(&user, QuizType::NameNote, Difficulty::Easy, None)
            .await
            .unwrap();
        let err = svc
            .create_session(&user, QuizType::LocateNote, Difficulty::Easy, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionConflict);
    }

    #[tokio::test]
    async fn answers_are_guarded_by_owner_and_state() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let owner = UserId::new("u1");
        let session = svc
            .create_session(&owner, QuizType::NameNote, Difficulty::Easy, None)
            .await
            .unwrap();

        let err = svc
            .record_answer(&UserId::new("u2"), session.id(), AnswerDraft::new(1, true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        svc.record_answer(&owner, session.id(), AnswerDraft::new(1, true))
            .await
            .unwrap();
        let err = svc
            .record_answer(&owner, session.id(), AnswerDraft::new(1, false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateAnswer);

        let err = svc
            .record_answer(&owner, session.id(), AnswerDraft::new(11, false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        svc.finalize(&owner, session.id(), FinalStatus::Abandoned, None)
            .await
            .unwrap();
        let err = svc
            .record_answer(&owner, session.id(), AnswerDraft::new(2, true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotActive);
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = UserId::new("u1");

        let err = SessionService::resolve_id("not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = svc
            .finalize(&user, SessionId::generate(), FinalStatus::Completed, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn completing_needs_exactly_ten_answers() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = UserId::new("u1");
        let session = svc
            .create_session(&user, QuizType::NameNote, Difficulty::Medium, None)
            .await
            .unwrap();

        for n in 1..=9 {
            svc.record_answer(&user, session.id(), AnswerDraft::new(n, true))
                .await
                .unwrap();
        }
        let err = svc
            .finalize(&user, session.id(), FinalStatus::Completed, Some(90))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteAnswers);
        let profile = svc.profile(&user).await.unwrap();
        assert_eq!(profile.total_quizzes(), 0);

        svc.record_answer(&user, session.id(), AnswerDraft::new(10, false))
            .await
            .unwrap();
        let outcome = svc
            .finalize(&user, session.id(), FinalStatus::Completed, Some(90))
            .await
            .unwrap();
        assert_eq!(outcome.session.status(), SessionStatus::Completed);
        assert_eq!(outcome.session.score(), Some(9));
        assert_eq!(outcome.session.time_taken_seconds(), Some(90));
    }

    #[tokio::test]
    async fn completion_updates_profile_and_grants_once() {
        let repo = InMemoryRepository::new();
        repo.upsert_achievement(&NewAchievement {
            name: "perfect_score".into(),
            display_name: "Flawless".into(),
            description: String::new(),
            criteria: Criterion::PerfectScore,
        })
        .await
        .unwrap();
        let storage = Storage::from_repository(repo);
        let svc = service(&storage);
        let user = UserId::new("u1");

        let first = svc
            .create_session(&user, QuizType::ChordTones, Difficulty::Easy, None)
            .await
            .unwrap();
        answer_all(&svc, &user, first.id(), 10).await;
        let outcome = svc
            .finalize(&user, first.id(), FinalStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(outcome.granted.len(), 1);

        let profile = svc.profile(&user).await.unwrap();
        assert_eq!(profile.current_streak(), 1);
        assert_eq!(profile.quiz_count(QuizType::ChordTones), 1);
        assert_eq!(profile.last_activity_date(), Some(fixed_now().date_naive()));

        let second = svc
            .create_session(&user, QuizType::ChordTones, Difficulty::Easy, None)
            .await
            .unwrap();
        answer_all(&svc, &user, second.id(), 10).await;
        let outcome = svc
            .finalize(&user, second.id(), FinalStatus::Completed, None)
            .await
            .unwrap();
        assert!(outcome.granted.is_empty());

        let profile = svc.profile(&user).await.unwrap();
        assert_eq!(profile.current_streak(), 1, "same day does not extend the streak");
        assert_eq!(profile.quiz_count(QuizType::ChordTones), 2);
    }

    #[tokio::test]
    async fn abandoning_leaves_profile_untouched() {
        let storage = Storage::in_memory();
        let svc = service(&storage);
        let user = UserId::new("u1");
        let session = svc
            .create_session(&user, QuizType::LocateNote, Difficulty::Easy, None)
            .await
            .unwrap();
        answer_all(&svc, &user, session.id(), 10).await;

        let outcome = svc
            .finalize(&user, session.id(), FinalStatus::Abandoned, Some(12))
            .await
            .unwrap();
        assert_eq!(outcome.session.status(), SessionStatus::Abandoned);
        assert_eq!(outcome.session.score(), None);
        assert!(outcome.granted.is_empty());
        assert_eq!(svc.profile(&user).await.unwrap(), Profile::new(user.clone()));

        let err = svc
            .finalize(&user, session.id(), FinalStatus::Completed, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyFinalized);
        assert!(svc.active_session(&user).await.unwrap().is_none());
    }
}
