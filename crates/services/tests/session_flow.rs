use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fret_core::model::{
    Achievement, AchievementGrant, AchievementId, Answer, AnswerDraft, Difficulty, FinalStatus,
    FretPosition, NewAchievement, PitchClass, QuizType, SessionId, SessionStatus, UserId,
};
use fret_core::time::fixed_now;
use services::{AppServices, Clock, EngineSettings, ErrorKind, HeatmapFilter, SessionService};
use storage::repository::{
    AchievementRepository, AnswerFilter, AnswerRepository, InMemoryRepository,
    ProfileRepository, Storage, StorageError,
};

fn services_at(storage: &Storage, at: DateTime<Utc>) -> AppServices {
    AppServices::from_storage(storage, Clock::fixed(at), EngineSettings::default())
}

/// Play one full session where question `n` is correct when `correct(n)`.
/// Wrong answers are placed at fret `n`, string 1, targeting note C.
async fn play(
    app: &AppServices,
    user: &UserId,
    quiz_type: QuizType,
    correct: impl Fn(u8) -> bool,
    status: FinalStatus,
) -> services::FinalizeOutcome {
    let sessions = app.sessions();
    let session = sessions
        .create_session(user, quiz_type, Difficulty::Medium, None)
        .await
        .unwrap();
    for n in 1..=10 {
        let mut draft = AnswerDraft::new(n, correct(n));
        draft.target_note = Some(PitchClass::C);
        draft.position = Some(FretPosition::new(n, 1).unwrap());
        sessions.record_answer(user, session.id(), draft).await.unwrap();
    }
    sessions
        .finalize(user, session.id(), status, Some(120))
        .await
        .unwrap()
}

fn names(outcome: &services::FinalizeOutcome) -> Vec<&str> {
    let mut names: Vec<_> = outcome.granted.iter().map(|a| a.name.as_str()).collect();
    names.sort_unstable();
    names
}

#[tokio::test]
async fn streak_builds_across_days_and_resets_after_a_gap() {
    let storage = Storage::in_memory();
    let user = UserId::new("learner");
    let day0 = fixed_now();
    services_at(&storage, day0)
        .achievements()
        .seed_catalog()
        .await
        .unwrap();

    let first = play(
        &services_at(&storage, day0),
        &user,
        QuizType::NameNote,
        |_| true,
        FinalStatus::Completed,
    )
    .await;
    assert_eq!(names(&first), vec!["first_quiz", "perfect_score"]);

    let second = play(
        &services_at(&storage, day0 + Duration::days(1)),
        &user,
        QuizType::NameNote,
        |n| n > 1,
        FinalStatus::Completed,
    )
    .await;
    assert!(second.granted.is_empty());

    let third = play(
        &services_at(&storage, day0 + Duration::days(2)),
        &user,
        QuizType::LocateNote,
        |n| n > 2,
        FinalStatus::Completed,
    )
    .await;
    assert_eq!(names(&third), vec!["streak_3"]);

    let app = services_at(&storage, day0 + Duration::days(5));
    play(&app, &user, QuizType::LocateNote, |_| false, FinalStatus::Completed).await;
    let profile = app.sessions().profile(&user).await.unwrap();
    assert_eq!(profile.current_streak(), 1);
    assert_eq!(profile.longest_streak(), 3);
    assert_eq!(profile.total_quizzes(), 4);
    assert_eq!(profile.quiz_count(QuizType::LocateNote), 2);

    let listing = app.achievements().list_for_user(&user).await.unwrap();
    let earned = listing.iter().filter(|i| i.earned_at.is_some()).count();
    assert_eq!(earned, 3);
}

#[tokio::test]
async fn stats_cover_completed_sessions_only() {
    let storage = Storage::in_memory();
    let user = UserId::new("learner");
    let now = fixed_now();

    // Ten days ago: 6/10 on name_note; two days ago: 9/10 on locate_note.
    play(
        &services_at(&storage, now - Duration::days(10)),
        &user,
        QuizType::NameNote,
        |n| n <= 6,
        FinalStatus::Completed,
    )
    .await;
    play(
        &services_at(&storage, now - Duration::days(2)),
        &user,
        QuizType::LocateNote,
        |n| n != 3,
        FinalStatus::Completed,
    )
    .await;
    // Abandoned answers never show up in stats.
    play(
        &services_at(&storage, now - Duration::days(1)),
        &user,
        QuizType::LocateNote,
        |_| false,
        FinalStatus::Abandoned,
    )
    .await;

    let stats = services_at(&storage, now).stats();

    let heatmap = stats.heatmap(&user, HeatmapFilter::default()).await.unwrap();
    assert_eq!(heatmap.total_errors, 5);
    assert_eq!(heatmap.max_error_count, 1);
    assert_eq!(heatmap.count_at(3, 1), 1);
    assert_eq!(heatmap.count_at(7, 1), 1);
    assert_eq!(heatmap.count_at(1, 1), 0);

    let only_locate = stats
        .heatmap(
            &user,
            HeatmapFilter {
                quiz_type: Some(QuizType::LocateNote),
                ..HeatmapFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(only_locate.total_errors, 1);

    let last_week = stats
        .heatmap(
            &user,
            HeatmapFilter {
                from: Some((now - Duration::days(7)).date_naive()),
                to: Some(now.date_naive()),
                ..HeatmapFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(last_week.total_errors, 1);

    let mastery = stats.note_mastery(&user).await.unwrap();
    let c = mastery.for_note(PitchClass::C);
    assert_eq!((c.total, c.correct, c.accuracy), (20, 15, 75));
    assert_eq!(mastery.for_note(PitchClass::G).total, 0);

    let overview = stats.overview(&user).await.unwrap();
    assert_eq!(overview.total_sessions, 2);
    assert_eq!(overview.total_practice_seconds, 240);
    assert_eq!(overview.trend.recent_average, 9.0);
    assert_eq!(overview.trend.prior_average, 6.0);
    assert_eq!(overview.trend.improvement, 50.0);
    let medium = overview
        .by_difficulty
        .iter()
        .find(|d| d.difficulty == Difficulty::Medium)
        .unwrap();
    assert_eq!(medium.count, 2);
    assert_eq!(medium.average_score, 7.5);
}

#[tokio::test]
async fn focus_areas_wait_for_enough_history() {
    let storage = Storage::in_memory();
    let user = UserId::new("learner");
    let app = services_at(&storage, fixed_now());

    play(&app, &user, QuizType::NameNote, |n| n % 2 == 0, FinalStatus::Completed).await;
    let err = app.stats().focus_areas(&user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);

    let later = services_at(&storage, fixed_now() + Duration::hours(1));
    play(&later, &user, QuizType::ChordTones, |_| true, FinalStatus::Completed).await;
    let focus = later.stats().focus_areas(&user).await.unwrap();
    assert_eq!(focus.sample_size, 20);
    assert_eq!(focus.weakest_notes[0].note, PitchClass::C);
    assert_eq!(focus.hot_spots.len(), 5);
    assert_eq!(
        focus.weakest_quiz_type.map(|q| q.quiz_type),
        Some(QuizType::NameNote)
    );
}

#[tokio::test]
async fn session_detail_lists_answers_in_question_order() {
    let storage = Storage::in_memory();
    let user = UserId::new("learner");
    let sessions = services_at(&storage, fixed_now()).sessions();
    let session = sessions
        .create_session(&user, QuizType::Intervals, Difficulty::Easy, None)
        .await
        .unwrap();
    for n in [4, 2, 9] {
        sessions
            .record_answer(&user, session.id(), AnswerDraft::new(n, true))
            .await
            .unwrap();
    }

    let detail = sessions.get_session(&user, session.id()).await.unwrap();
    let order: Vec<u8> = detail.answers.iter().map(|a| a.question_number).collect();
    assert_eq!(order, vec![2, 4, 9]);
    assert_eq!(detail.answered(), 3);

    let err = sessions
        .get_session(&UserId::new("someone-else"), session.id())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let active = sessions.active_session(&user).await.unwrap().unwrap();
    assert_eq!(active.id(), session.id());
    let recent = sessions.recent_sessions(&user, 5).await.unwrap();
    assert_eq!(recent.len(), 1);
}

/// Answer store that is always unreachable.
#[derive(Clone)]
struct OfflineAnswers;

#[async_trait]
impl AnswerRepository for OfflineAnswers {
    async fn insert_answer(&self, _answer: &Answer) -> Result<(), StorageError> {
        Err(StorageError::Connection("pool timed out".into()))
    }

    async fn answers_for_session(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<Answer>, StorageError> {
        Err(StorageError::Connection("pool timed out".into()))
    }

    async fn answers_for_user(
        &self,
        _user_id: &UserId,
        _filter: &AnswerFilter,
    ) -> Result<Vec<Answer>, StorageError> {
        Err(StorageError::Connection("pool timed out".into()))
    }
}

#[tokio::test]
async fn storage_failures_surface_as_server_errors() {
    let repo = InMemoryRepository::new();
    let mut storage = Storage::from_repository(repo);
    storage.answers = Arc::new(OfflineAnswers);
    let app = services_at(&storage, fixed_now());
    let user = UserId::new("learner");

    let session = app
        .sessions()
        .create_session(&user, QuizType::NameNote, Difficulty::Easy, None)
        .await
        .unwrap();
    let err = app
        .sessions()
        .record_answer(&user, session.id(), AnswerDraft::new(1, true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerError);

    let err = app
        .sessions()
        .finalize(&user, session.id(), FinalStatus::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert!(app.sessions().active_session(&user).await.unwrap().is_some());

    let err = app.stats().note_mastery(&user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerError);

    assert!(SessionService::resolve_id(&session.id().to_string()).is_ok());
}

/// Catalog that serves one read and then goes offline.
struct OneShotCatalog {
    inner: InMemoryRepository,
    reads: AtomicUsize,
}

#[async_trait]
impl AchievementRepository for OneShotCatalog {
    async fn upsert_achievement(
        &self,
        achievement: &NewAchievement,
    ) -> Result<AchievementId, StorageError> {
        self.inner.upsert_achievement(achievement).await
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(StorageError::Connection("pool timed out".into()));
        }
        self.inner.list_achievements().await
    }

    async fn grants_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AchievementGrant>, StorageError> {
        self.inner.grants_for_user(user_id).await
    }

    async fn insert_grant(&self, grant: &AchievementGrant) -> Result<bool, StorageError> {
        self.inner.insert_grant(grant).await
    }
}

#[tokio::test]
async fn committed_finalize_reports_grants_without_rereading_catalog() {
    let repo = InMemoryRepository::new();
    let mut storage = Storage::from_repository(repo.clone());
    services_at(&storage, fixed_now())
        .achievements()
        .seed_catalog()
        .await
        .unwrap();
    let catalog = Arc::new(OneShotCatalog {
        inner: repo.clone(),
        reads: AtomicUsize::new(0),
    });
    storage.achievements = catalog.clone();
    let app = services_at(&storage, fixed_now());
    let user = UserId::new("learner");

    let session = app
        .sessions()
        .create_session(&user, QuizType::NameNote, Difficulty::Medium, None)
        .await
        .unwrap();
    for n in 1..=10 {
        app.sessions()
            .record_answer(&user, session.id(), AnswerDraft::new(n, true))
            .await
            .unwrap();
    }

    let outcome = app
        .sessions()
        .finalize(&user, session.id(), FinalStatus::Completed, Some(60))
        .await
        .unwrap();
    assert_eq!(outcome.session.status(), SessionStatus::Completed);
    assert_eq!(names(&outcome), vec!["first_quiz", "perfect_score"]);
    assert_eq!(catalog.reads.load(Ordering::SeqCst), 1);
    assert_eq!(repo.grants_for_user(&user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn reading_stats_never_creates_a_profile() {
    let storage = Storage::in_memory();
    let app = services_at(&storage, fixed_now());
    app.achievements().seed_catalog().await.unwrap();
    let user = UserId::new("newcomer");

    let overview = app.stats().overview(&user).await.unwrap();
    assert_eq!(overview.current_streak, 0);
    let items = app.achievements().list_for_user(&user).await.unwrap();
    assert!(items.iter().all(|i| i.earned_at.is_none()));
    let profile = app.sessions().profile(&user).await.unwrap();
    assert_eq!(profile.total_quizzes(), 0);

    assert!(storage.profiles.get_profile(&user).await.unwrap().is_none());
}
