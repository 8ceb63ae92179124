use std::fmt;

use learn_core::model::{AppSettings, AppSettingsDraft, QuizId};
use services::{AppServices, Clock};
use tokio::io::BufReader;
use tracing::info;

mod telemetry;
mod terminal;

const DEFAULT_QUIZ_ID: &str = "python-basics";
const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidQuizId { raw: String },
    InvalidMinutes { raw: String },
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidQuizId { raw } => write!(f, "invalid --quiz value: {raw}"),
            ArgsError::InvalidMinutes { raw } => {
                write!(f, "invalid --minutes value (expected a positive integer): {raw}")
            }
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quiz    [--db <sqlite_url>] [--quiz <id>] [--minutes <n>] [--shuffle]");
    eprintln!("  cargo run -p app -- list    [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--quiz <id>] [--limit <n>]");
    eprintln!("  cargo run -p app -- chat    [--topic <language>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:dev.sqlite3");
    eprintln!("  --quiz {DEFAULT_QUIZ_ID}");
    eprintln!("  --minutes <the quiz's own time limit>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_QUIZ_ID, LEARN_TIME_LIMIT_MINUTES, LEARN_SHUFFLE");
    eprintln!("  LEARN_AI_API_KEY, LEARN_AI_BASE_URL, LEARN_AI_MODEL, LEARN_CHAT_HISTORY");
    eprintln!("  RUST_LOG (log filter, written to stderr)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    List,
    History,
    Chat,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "list" => Some(Self::List),
            "history" => Some(Self::History),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    quiz_id: QuizId,
    minutes: Option<u32>,
    shuffle: bool,
    limit: u32,
    topic: Option<String>,
}

fn parse_quiz_id(raw: String) -> Result<QuizId, ArgsError> {
    QuizId::new(raw.clone()).map_err(|_| ArgsError::InvalidQuizId { raw })
}

fn parse_minutes(raw: String) -> Result<u32, ArgsError> {
    match raw.trim().parse::<u32>() {
        Ok(minutes) if minutes > 0 => Ok(minutes),
        _ => Err(ArgsError::InvalidMinutes { raw }),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut quiz_id = parse_quiz_id(
            std::env::var("LEARN_QUIZ_ID").unwrap_or_else(|_| DEFAULT_QUIZ_ID.into()),
        )?;
        let mut minutes = std::env::var("LEARN_TIME_LIMIT_MINUTES")
            .ok()
            .map(parse_minutes)
            .transpose()?;
        let mut shuffle = env_flag("LEARN_SHUFFLE");
        let mut limit = DEFAULT_HISTORY_LIMIT;
        let mut topic = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--quiz" => quiz_id = parse_quiz_id(require_value(args, "--quiz")?)?,
                "--minutes" => minutes = Some(parse_minutes(require_value(args, "--minutes")?)?),
                "--shuffle" => shuffle = true,
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            quiz_id,
            minutes,
            shuffle,
            limit,
            topic,
        })
    }
}

fn settings_from_env() -> Result<AppSettings, Box<dyn std::error::Error>> {
    let chat_history_limit = std::env::var("LEARN_CHAT_HISTORY")
        .ok()
        .map(|value| value.trim().parse::<usize>())
        .transpose()?;
    let draft = AppSettingsDraft {
        api_key: std::env::var("LEARN_AI_API_KEY").ok(),
        api_model: std::env::var("LEARN_AI_MODEL").ok(),
        api_base_url: std::env::var("LEARN_AI_BASE_URL").ok(),
        chat_history_limit,
    };
    Ok(draft.validate()?)
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Without a subcommand, start a quiz.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Quiz,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Quiz,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let settings = settings_from_env()?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::System, settings)
        .await?
        .with_quiz_options(parsed.shuffle, parsed.minutes);
    info!(db = %parsed.db_url, command = ?cmd, "services ready");

    let stdin = BufReader::new(tokio::io::stdin());
    match cmd {
        Command::Quiz => {
            terminal::run_quiz(&app, &parsed.quiz_id, stdin).await?;
        }
        Command::List => {
            let items = app.attempts().catalog_overview().await?;
            terminal::print_catalog(&items);
        }
        Command::History => {
            let items = app
                .attempts()
                .list_recent_attempts(&parsed.quiz_id, parsed.limit)
                .await?;
            terminal::print_history(&parsed.quiz_id, &items);
        }
        Command::Chat => {
            terminal::run_chat(&app, parsed.topic, stdin).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
