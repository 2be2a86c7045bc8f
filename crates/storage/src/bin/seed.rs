use std::fmt;

use chrono::{DateTime, Utc};
use storage::repository::Storage;
use storage::sqlite::SqliteRepository;
use vocab_core::model::{LearnerId, VocabularyEntry, WordId, WordRecord};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    learner_id: Option<LearnerId>,
    words: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLearnerId { raw: String },
    InvalidWords { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLearnerId { raw } => write!(f, "invalid --learner value: {raw}"),
            ArgsError::InvalidWords { raw } => write!(f, "invalid --words value: {raw}"),
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
            std::env::var("VOCAB_DB_URL").unwrap_or_else(|_| "sqlite:vocab.sqlite3".into());
        let mut learner_id = std::env::var("VOCAB_SEED_LEARNER")
            .ok()
            .and_then(|value| value.parse::<LearnerId>().ok());
        let mut words = SAMPLES.len() as u32;
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
                "--learner" => {
                    let value = require_value(&mut args, "--learner")?;
                    let parsed = value
                        .parse::<LearnerId>()
                        .map_err(|_| ArgsError::InvalidLearnerId { raw: value.clone() })?;
                    learner_id = Some(parsed);
                }
                "--words" => {
                    let value = require_value(&mut args, "--words")?;
                    words = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidWords { raw: value.clone() })?;
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
            learner_id,
            words,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:vocab.sqlite3)");
    eprintln!("  --learner <id>            Also add the seeded words to this learner's list");
    eprintln!("  --words <n>               Number of sample catalog words to write");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  VOCAB_DB_URL, VOCAB_SEED_LEARNER");
}

const SAMPLES: [(&str, &str, &str, &str); 6] = [
    ("abandon", "/əˈbændən/", "v.", "to leave behind"),
    ("benevolent", "/bəˈnevələnt/", "adj.", "kind and generous"),
    ("candid", "/ˈkændɪd/", "adj.", "honest and direct"),
    ("diligent", "/ˈdɪlɪdʒənt/", "adj.", "careful and hard-working"),
    ("eloquent", "/ˈeləkwənt/", "adj.", "fluent and persuasive"),
    ("frugal", "/ˈfruːɡl/", "adj.", "sparing with money"),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut word_ids = Vec::new();
    for i in 0..args.words {
        let (spelling, phonetic, pos, meaning) = SAMPLES[(i as usize) % SAMPLES.len()];
        let word_id = WordId::new(u64::from(i + 1));
        let entry = VocabularyEntry::new(word_id, spelling)
            .with_pronunciation("us", phonetic)
            .with_translation(Some(pos), meaning);
        repo.upsert_vocabulary_entry(&entry).await?;
        word_ids.push(word_id);
    }

    let storage = Storage::from_sqlite(repo);
    if let Some(learner_id) = args.learner_id {
        for word_id in &word_ids {
            if storage.records.get_record(learner_id, *word_id).await?.is_none() {
                let record = WordRecord::new_unstarted(learner_id, *word_id, now);
                storage.records.upsert_record(&record).await?;
            }
        }
    }

    println!(
        "Seeded {} vocabulary entries into {}{}",
        word_ids.len(),
        args.db_url,
        args.learner_id
            .map(|id| format!(" for learner {id}"))
            .unwrap_or_default()
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
