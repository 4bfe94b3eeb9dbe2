#![forbid(unsafe_code)]

pub mod achievements;
pub mod app_services;
pub mod error;
pub mod sessions;
pub mod settings;
pub mod stats;

pub use fret_core::Clock;

pub use achievements::{AchievementListItem, AchievementService};
pub use app_services::AppServices;
pub use error::{
    AchievementError, AppServicesError, ErrorKind, SessionError, SettingsError, StatsError,
};
pub use sessions::{FinalizeOutcome, SessionDetail, SessionService};
pub use settings::EngineSettings;
pub use stats::{HeatmapFilter, StatsService};
