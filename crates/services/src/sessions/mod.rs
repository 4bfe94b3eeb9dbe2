mod service;
mod view;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use service::SessionService;
pub use view::{FinalizeOutcome, SessionDetail};
