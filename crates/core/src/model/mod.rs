mod achievement;
mod answer;
mod ids;
mod note;
mod profile;
mod quiz;
mod session;

pub use achievement::{
    Achievement, AchievementGrant, AchievementProgress, Criterion, NewAchievement,
    default_catalog,
};
pub use answer::{Answer, AnswerDraft, AnswerError, count_correct};
pub use ids::{AchievementId, ParseIdError, SessionId, UserId};
pub use note::{FretPosition, Interval, MAX_FRET, PitchClass, PositionError, STRING_COUNT};
pub use profile::{Profile, ProfileError, QuizCounters};
pub use quiz::{Difficulty, ParseEnumError, QuizType};
pub use session::{
    FinalStatus, QUESTIONS_PER_SESSION, Session, SessionModelError, SessionStatus,
    ensure_completable,
};
