use thiserror::Error;

use crate::model::{
    AnswerError, ParseEnumError, ParseIdError, PositionError, ProfileError, SessionModelError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionModelError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    ParseEnum(#[from] ParseEnumError),
}
