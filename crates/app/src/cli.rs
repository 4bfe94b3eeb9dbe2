use std::fmt;

use chrono::NaiveDate;
use fret_core::model::{Difficulty, FretPosition, PitchClass, QuizType};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    Invalid { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::Invalid { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Flags accepted by every command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    pub db_url: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Seed,
    Start {
        quiz_type: QuizType,
        difficulty: Difficulty,
        time_limit_seconds: Option<u32>,
    },
    Answer {
        session: String,
        question: u8,
        correct: bool,
        note: Option<PitchClass>,
        position: Option<FretPosition>,
        time_ms: Option<u32>,
    },
    Finish {
        session: String,
        abandon: bool,
        seconds: Option<u32>,
    },
    Show {
        session: String,
    },
    Stats {
        quiz_type: Option<QuizType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Achievements,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub global: GlobalArgs,
    pub command: Command,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fretdrill seed");
    eprintln!("  fretdrill start --quiz <type> --difficulty <easy|medium|hard> [--time-limit <s>]");
    eprintln!(
        "  fretdrill answer --session <id> --question <n> --correct <true|false> [--note <pc>] [--fret <n> --string <n>] [--time-ms <n>]"
    );
    eprintln!("  fretdrill finish --session <id> [--abandon] [--seconds <n>]");
    eprintln!("  fretdrill show --session <id>");
    eprintln!("  fretdrill stats [--quiz <type>] [--from <YYYY-MM-DD>] [--to <YYYY-MM-DD>]");
    eprintln!("  fretdrill achievements");
    eprintln!();
    eprintln!("Global flags: --db <sqlite_url> --user <id>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FRETDRILL_DB_URL, FRETDRILL_USER, FRETDRILL_UTC_OFFSET_MINUTES,");
    eprintln!("  FRETDRILL_MIN_ANALYSIS_ANSWERS, FRETDRILL_TREND_WINDOW_DAYS, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_value<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.parse().map_err(|_| ArgsError::Invalid { flag, raw })
}

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

impl Cli {
    /// Parse arguments after the program name.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown commands or flags and malformed values.
    pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut global = GlobalArgs::default();
        let mut name: Option<String> = None;
        let mut rest = Vec::new();

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::Invalid {
                            flag: "--db",
                            raw: value,
                        });
                    }
                    global.db_url = Some(value);
                }
                "--user" => global.user = Some(require_value(&mut args, "--user")?),
                "--help" | "-h" => name = Some("help".into()),
                _ if name.is_none() && !arg.starts_with("--") => name = Some(arg),
                _ => rest.push(arg),
            }
        }

        let command = match name.as_deref() {
            None | Some("help") => Command::Help,
            Some("seed") => no_flags(rest, Command::Seed)?,
            Some("achievements") => no_flags(rest, Command::Achievements)?,
            Some("start") => parse_start(rest)?,
            Some("answer") => parse_answer(rest)?,
            Some("finish") => parse_finish(rest)?,
            Some("show") => parse_show(rest)?,
            Some("stats") => parse_stats(rest)?,
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        Ok(Self { global, command })
    }
}

fn no_flags(rest: Vec<String>, command: Command) -> Result<Command, ArgsError> {
    match rest.into_iter().next() {
        Some(arg) => Err(ArgsError::UnknownArg(arg)),
        None => Ok(command),
    }
}

fn parse_start(rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut quiz_type = None;
    let mut difficulty = None;
    let mut time_limit_seconds = None;

    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quiz" => quiz_type = Some(parse_value(&mut args, "--quiz")?),
            "--difficulty" => difficulty = Some(parse_value(&mut args, "--difficulty")?),
            "--time-limit" => time_limit_seconds = Some(parse_value(&mut args, "--time-limit")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(Command::Start {
        quiz_type: required(quiz_type, "--quiz")?,
        difficulty: required(difficulty, "--difficulty")?,
        time_limit_seconds,
    })
}

fn parse_answer(rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut session = None;
    let mut question = None;
    let mut correct = None;
    let mut note = None;
    let mut fret: Option<u8> = None;
    let mut string: Option<u8> = None;
    let mut time_ms = None;

    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" => session = Some(require_value(&mut args, "--session")?),
            "--question" => question = Some(parse_value(&mut args, "--question")?),
            "--correct" => correct = Some(parse_value(&mut args, "--correct")?),
            "--note" => note = Some(parse_value(&mut args, "--note")?),
            "--fret" => fret = Some(parse_value(&mut args, "--fret")?),
            "--string" => string = Some(parse_value(&mut args, "--string")?),
            "--time-ms" => time_ms = Some(parse_value(&mut args, "--time-ms")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    let position = match (fret, string) {
        (None, None) => None,
        (Some(f), Some(s)) => Some(FretPosition::new(f, s).map_err(|_| ArgsError::Invalid {
            flag: "--fret/--string",
            raw: format!("{f}/{s}"),
        })?),
        (Some(_), None) => return Err(ArgsError::MissingFlag { flag: "--string" }),
        (None, Some(_)) => return Err(ArgsError::MissingFlag { flag: "--fret" }),
    };

    Ok(Command::Answer {
        session: required(session, "--session")?,
        question: required(question, "--question")?,
        correct: required(correct, "--correct")?,
        note,
        position,
        time_ms,
    })
}

fn parse_finish(rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut session = None;
    let mut abandon = false;
    let mut seconds = None;

    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" => session = Some(require_value(&mut args, "--session")?),
            "--abandon" => abandon = true,
            "--seconds" => seconds = Some(parse_value(&mut args, "--seconds")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(Command::Finish {
        session: required(session, "--session")?,
        abandon,
        seconds,
    })
}

fn parse_show(rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut session = None;
    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" => session = Some(require_value(&mut args, "--session")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Show {
        session: required(session, "--session")?,
    })
}

fn parse_stats(rest: Vec<String>) -> Result<Command, ArgsError> {
    let mut quiz_type = None;
    let mut from = None;
    let mut to = None;

    let mut args = rest.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quiz" => quiz_type = Some(parse_value(&mut args, "--quiz")?),
            "--from" => from = Some(parse_value(&mut args, "--from")?),
            "--to" => to = Some(parse_value(&mut args, "--to")?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(Command::Stats {
        quiz_type,
        from,
        to,
    })
}
