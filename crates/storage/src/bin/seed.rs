use std::fmt;

use chrono::{DateTime, Duration, Utc};
use learn_core::model::{Completion, QuizAttempt, QuizResult};
use storage::catalog::{builtin_catalog, parse_catalog, seed_catalog};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    catalog_path: Option<String>,
    attempts: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidAttempts { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidAttempts { raw } => write!(f, "invalid --attempts value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LEARN_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut catalog_path = std::env::var("LEARN_CATALOG").ok();
        let mut attempts = std::env::var("LEARN_SEED_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--catalog" => {
                    catalog_path = Some(require_value(&mut args, "--catalog")?);
                }
                "--attempts" => {
                    let value = require_value(&mut args, "--attempts")?;
                    attempts = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidAttempts { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            catalog_path,
            attempts,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --catalog <path>          JSON catalog to load instead of the built-in one");
    eprintln!("  --attempts <n>            Sample attempts to append per quiz (default: 0)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LEARN_DB_URL, LEARN_CATALOG, LEARN_SEED_ATTEMPTS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = match args.catalog_path.as_deref() {
        Some(path) => parse_catalog(&std::fs::read_to_string(path)?)?,
        None => builtin_catalog()?,
    };

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let written = seed_catalog(&storage, &catalog).await?;

    let mut appended = 0_u32;
    for entry in &catalog {
        let total = u32::try_from(entry.questions.len())?;
        for i in 0..args.attempts {
            let completed_at = now - Duration::days(i64::from(i) * 2);
            let started_at = completed_at - Duration::minutes(i64::from(
                entry.quiz.time_limit_minutes() / 2,
            ));
            // Alternate between a perfect run and a timed-out partial one.
            let result = if i % 2 == 0 {
                QuizResult::tally(total, total, 0, Completion::Submitted)
            } else {
                QuizResult::tally(total / 2, total, total - total / 2, Completion::TimedOut)
            };
            let attempt = QuizAttempt::new(
                entry.quiz.id().clone(),
                started_at,
                completed_at,
                result,
                entry.quiz.passing_score().is_met_by(&result),
            )?;
            storage.attempts.append_attempt(&attempt).await?;
            appended += 1;
        }
    }

    println!(
        "Seeded {written} quizzes and {appended} sample attempts into {}",
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
