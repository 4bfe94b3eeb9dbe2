use chrono::Duration;
use fret_core::model::{
    AchievementGrant, AnswerDraft, Criterion, Difficulty, FretPosition, Interval, NewAchievement,
    PitchClass, Profile, QuizType, Session, SessionId, SessionStatus, UserId, default_catalog,
};
use fret_core::time::fixed_now;
use storage::repository::{
    AchievementRepository, AnswerFilter, AnswerRepository, FinalizeCommit, FinalizePersistence,
    ProfileRepository, ProfileUpdate, SessionFilter, SessionRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn open_session(user: &str, quiz_type: QuizType) -> Session {
    Session::start(
        SessionId::generate(),
        UserId::new(user),
        quiz_type,
        Difficulty::Hard,
        Some(30),
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_answer_fields() {
    let repo = connect("memdb_answers").await;
    let session = open_session("u1", QuizType::Intervals);
    repo.insert_session(&session).await.unwrap();

    let mut draft = AnswerDraft::new(1, false);
    draft.time_taken_ms = Some(1830);
    draft.target_note = Some(PitchClass::FSharp);
    draft.selected_note = Some(PitchClass::G);
    draft.target_interval = Some(Interval::PerfectFifth);
    draft.selected_interval = Some(Interval::MinorSixth);
    draft.target_chord = Some(" Cmaj7 ".into());
    draft.chord_root = Some(PitchClass::C);
    draft.position = Some(FretPosition::new(3, 5).unwrap());
    draft.selected_positions = vec![
        FretPosition::new(3, 5).unwrap(),
        FretPosition::new(2, 4).unwrap(),
    ];
    draft.reference_position = Some(FretPosition::new(0, 6).unwrap());
    let answer = draft.validate(session.id(), fixed_now()).unwrap();
    repo.insert_answer(&answer).await.unwrap();

    let stored = repo.answers_for_session(session.id()).await.unwrap();
    assert_eq!(stored, vec![answer]);
    assert_eq!(stored[0].target_chord.as_deref(), Some("Cmaj7"));

    let fetched = repo.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(fetched, session);
}

#[tokio::test]
async fn sqlite_enforces_one_open_session_and_unique_answers() {
    let repo = connect("memdb_uniques").await;
    let first = open_session("u1", QuizType::NameNote);
    repo.insert_session(&first).await.unwrap();

    let err = repo
        .insert_session(&open_session("u1", QuizType::LocateNote))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    repo.insert_session(&open_session("u2", QuizType::LocateNote))
        .await
        .unwrap();

    let answer = AnswerDraft::new(7, true)
        .validate(first.id(), fixed_now())
        .unwrap();
    repo.insert_answer(&answer).await.unwrap();
    let err = repo.insert_answer(&answer).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let active = repo.active_session(&UserId::new("u1")).await.unwrap();
    assert_eq!(active.map(|s| s.id()), Some(first.id()));
}

#[tokio::test]
async fn sqlite_finalize_is_all_or_nothing() {
    let repo = connect("memdb_finalize").await;
    let user = UserId::new("u1");
    let catalog_id = repo
        .upsert_achievement(&NewAchievement {
            name: "first_quiz".into(),
            display_name: "First Steps".into(),
            description: "Complete your first quiz".into(),
            criteria: Criterion::TotalQuizzes { count: 1 },
        })
        .await
        .unwrap();
    let profile = repo.ensure_profile(&user).await.unwrap();
    assert_eq!(profile, Profile::new(user.clone()));

    let session = open_session("u1", QuizType::ChordTones);
    repo.insert_session(&session).await.unwrap();
    for n in 1..=10 {
        let answer = AnswerDraft::new(n, n != 4)
            .validate(session.id(), fixed_now())
            .unwrap();
        repo.insert_answer(&answer).await.unwrap();
    }

    let done_at = fixed_now() + Duration::minutes(3);
    let mut done = session.clone();
    done.complete(10, 9, Some(170), done_at).unwrap();
    let next = profile.after_completion(QuizType::ChordTones, done_at.date_naive());

    // A stale profile snapshot aborts the whole commit.
    let stale = FinalizeCommit {
        session: done.clone(),
        expected_answers: Some(10),
        profile: Some(ProfileUpdate {
            expected: next.clone(),
            next: next.after_completion(QuizType::ChordTones, done_at.date_naive()),
        }),
        grants: vec![catalog_id],
    };
    let err = repo.commit_finalize(&stale).await.unwrap_err();
    assert!(matches!(err, StorageError::StaleWrite("profile")));
    let still_open = repo.get_session(session.id()).await.unwrap().unwrap();
    assert_eq!(still_open.status(), SessionStatus::InProgress);
    assert!(repo.grants_for_user(&user).await.unwrap().is_empty());

    let commit = FinalizeCommit {
        session: done.clone(),
        expected_answers: Some(10),
        profile: Some(ProfileUpdate {
            expected: profile,
            next: next.clone(),
        }),
        grants: vec![catalog_id],
    };
    let granted = repo.commit_finalize(&commit).await.unwrap();
    assert_eq!(granted, vec![catalog_id]);
    assert_eq!(repo.get_profile(&user).await.unwrap(), Some(next));
    assert_eq!(repo.get_session(session.id()).await.unwrap(), Some(done));

    let err = repo.commit_finalize(&commit).await.unwrap_err();
    assert!(matches!(err, StorageError::StaleWrite("session")));

    let late = AnswerDraft::new(1, true)
        .validate(session.id(), fixed_now())
        .unwrap();
    let err = repo.insert_answer(&late).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict | StorageError::StaleWrite(_)));
}

#[tokio::test]
async fn sqlite_filters_history_by_type_and_completion_date() {
    let repo = connect("memdb_filters").await;
    let user = UserId::new("u1");
    let base = fixed_now();

    for (offset, quiz_type) in [
        (0, QuizType::NameNote),
        (2, QuizType::LocateNote),
        (4, QuizType::NameNote),
    ] {
        let session = Session::start(
            SessionId::generate(),
            user.clone(),
            quiz_type,
            Difficulty::Easy,
            None,
            base + Duration::days(offset),
        )
        .unwrap();
        repo.insert_session(&session).await.unwrap();
        for n in 1..=10 {
            let answer = AnswerDraft::new(n, false)
                .validate(session.id(), session.started_at())
                .unwrap();
            repo.insert_answer(&answer).await.unwrap();
        }
        let mut done = session.clone();
        done.complete(10, 0, None, session.started_at() + Duration::minutes(5))
            .unwrap();
        let commit = FinalizeCommit {
            session: done,
            expected_answers: Some(10),
            profile: None,
            grants: Vec::new(),
        };
        repo.commit_finalize(&commit).await.unwrap();
    }

    let all = repo
        .list_sessions(&user, &SessionFilter::completed())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].started_at() > all[2].started_at(), "newest first");

    let limited = repo
        .list_sessions(
            &user,
            &SessionFilter {
                limit: Some(1),
                ..SessionFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    let name_note = repo
        .answers_for_user(
            &user,
            &AnswerFilter {
                quiz_type: Some(QuizType::NameNote),
                ..AnswerFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(name_note.len(), 20);

    let window = repo
        .answers_for_user(
            &user,
            &AnswerFilter {
                completed_from: Some(base + Duration::days(1)),
                completed_before: Some(base + Duration::days(3)),
                ..AnswerFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(window.len(), 10);
}

#[tokio::test]
async fn sqlite_catalog_upserts_by_name_and_grants_once() {
    let repo = connect("memdb_catalog").await;
    for entry in default_catalog() {
        repo.upsert_achievement(&entry).await.unwrap();
    }
    let mut renamed = default_catalog().remove(0);
    renamed.display_name = "Renamed".into();
    let id = repo.upsert_achievement(&renamed).await.unwrap();

    let catalog = repo.list_achievements().await.unwrap();
    assert_eq!(catalog.len(), default_catalog().len());
    let entry = catalog.iter().find(|a| a.id == id).unwrap();
    assert_eq!(entry.display_name, "Renamed");
    assert_eq!(entry.criteria, renamed.criteria);

    let grant = AchievementGrant {
        user_id: UserId::new("u1"),
        achievement_id: id,
        earned_at: fixed_now(),
    };
    assert!(repo.insert_grant(&grant).await.unwrap());
    assert!(!repo.insert_grant(&grant).await.unwrap());
    assert_eq!(repo.grants_for_user(&grant.user_id).await.unwrap(), vec![grant]);
}
