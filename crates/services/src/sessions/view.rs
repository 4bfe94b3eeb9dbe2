use serde::Serialize;

use fret_core::model::{Achievement, Answer, Session};

/// A session with its answers in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub answers: Vec<Answer>,
}

impl SessionDetail {
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answers.len()
    }
}

/// Result of a finalize call.
///
/// `granted` lists only achievements inserted by this call; it is empty for
/// abandoned sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub session: Session,
    pub granted: Vec<Achievement>,
}
