use fret_core::model::{AnswerDraft, FinalStatus};
use serde_json::{Value, json};
use services::{AppServices, Clock, EngineSettings, ErrorKind, HeatmapFilter, SessionService};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

use cli::{Cli, Command};
use config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "fretdrill=info,services=info,storage=warn";

/// A failure ready to print: a stable kind plus a message.
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn new(kind: ErrorKind, err: impl std::fmt::Display) -> Self {
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

macro_rules! fail {
    ($err:expr) => {{
        let err = $err;
        Failure::new(err.kind(), err)
    }};
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|e| Failure::new(ErrorKind::ServerError, e))
}

async fn run(cli: Cli) -> Result<Value, Failure> {
    let config =
        AppConfig::resolve(&cli.global).map_err(|e| Failure::new(ErrorKind::Validation, e))?;
    let settings = EngineSettings::from_env().map_err(|e| Failure::new(ErrorKind::Validation, e))?;

    config::prepare_sqlite_file(&config.db_url)
        .map_err(|e| Failure::new(ErrorKind::ServerError, e))?;
    let app = AppServices::new_sqlite(&config.db_url, Clock::default_clock(), settings)
        .await
        .map_err(|e| fail!(e))?;
    tracing::debug!(db = %config.db_url, user_id = %config.user_id, "services ready");

    let user = &config.user_id;
    match cli.command {
        Command::Help => Ok(Value::Null),
        Command::Seed => {
            let catalog = app
                .achievements()
                .seed_catalog()
                .await
                .map_err(|e| fail!(e))?;
            to_json(&catalog)
        }
        Command::Start {
            quiz_type,
            difficulty,
            time_limit_seconds,
        } => {
            let session = app
                .sessions()
                .create_session(user, quiz_type, difficulty, time_limit_seconds)
                .await
                .map_err(|e| fail!(e))?;
            to_json(&session)
        }
        Command::Answer {
            session,
            question,
            correct,
            note,
            position,
            time_ms,
        } => {
            let session_id = SessionService::resolve_id(&session).map_err(|e| fail!(e))?;
            let mut draft = AnswerDraft::new(question, correct);
            draft.target_note = note;
            draft.position = position;
            draft.time_taken_ms = time_ms;
            let answer = app
                .sessions()
                .record_answer(user, session_id, draft)
                .await
                .map_err(|e| fail!(e))?;
            to_json(&answer)
        }
        Command::Finish {
            session,
            abandon,
            seconds,
        } => {
            let session_id = SessionService::resolve_id(&session).map_err(|e| fail!(e))?;
            let status = if abandon {
                FinalStatus::Abandoned
            } else {
                FinalStatus::Completed
            };
            let outcome = app
                .sessions()
                .finalize(user, session_id, status, seconds)
                .await
                .map_err(|e| fail!(e))?;
            to_json(&outcome)
        }
        Command::Show { session } => {
            let session_id = SessionService::resolve_id(&session).map_err(|e| fail!(e))?;
            let detail = app
                .sessions()
                .get_session(user, session_id)
                .await
                .map_err(|e| fail!(e))?;
            to_json(&detail)
        }
        Command::Stats {
            quiz_type,
            from,
            to,
        } => {
            let stats = app.stats();
            let filter = HeatmapFilter {
                quiz_type,
                from,
                to,
            };
            let heatmap = stats.heatmap(user, filter).await.map_err(|e| fail!(e))?;
            let mastery = stats.note_mastery(user).await.map_err(|e| fail!(e))?;
            let overview = stats.overview(user).await.map_err(|e| fail!(e))?;
            let focus = match stats.focus_areas(user).await {
                Ok(focus) => to_json(&focus)?,
                Err(err) if err.kind() == ErrorKind::InsufficientData => {
                    json!({ "error": err.kind().as_str(), "message": err.to_string() })
                }
                Err(err) => return Err(fail!(err)),
            };
            Ok(json!({
                "heatmap": to_json(&heatmap)?,
                "note_mastery": to_json(&mastery)?,
                "overview": to_json(&overview)?,
                "focus_areas": focus,
            }))
        }
        Command::Achievements => {
            let items = app
                .achievements()
                .list_for_user(user)
                .await
                .map_err(|e| fail!(e))?;
            to_json(&items)
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            cli::print_usage();
            print_failure(&Failure::new(ErrorKind::Validation, err));
            std::process::exit(2);
        }
    };
    if cli.command == Command::Help {
        cli::print_usage();
        return;
    }

    match run(cli).await {
        Ok(value) => println!("{value:#}"),
        Err(failure) => {
            tracing::warn!(kind = failure.kind.as_str(), "command failed");
            print_failure(&failure);
            std::process::exit(1);
        }
    }
}

fn print_failure(failure: &Failure) {
    println!(
        "{:#}",
        json!({ "error": failure.kind.as_str(), "message": failure.message })
    );
}
