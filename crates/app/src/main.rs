mod args;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use services::{AppServices, Clock, WordListRequest};
use tracing_subscriber::EnvFilter;
use vocab_core::model::StudyDate;

use crate::args::{ArgsError, Cli, Command, print_usage};

const DEFAULT_LOG_FILTER: &str = "warn,services=info,storage=info,app=info";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// A clock pinned to noon of `date` in the configured offset, or the system clock.
fn build_clock(today: Option<StudyDate>, offset: chrono::FixedOffset) -> Clock {
    let pinned = today.and_then(|date| {
        let noon = date.as_naive().and_hms_opt(12, 0, 0)?;
        offset.from_local_datetime(&noon).single()
    });
    let clock = match pinned {
        Some(at) => Clock::fixed(at.with_timezone(&Utc)),
        None => Clock::default_clock(),
    };
    clock.with_offset(offset)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(std::env::args().skip(1), |key| std::env::var(key).ok()).map_err(
        |e| {
            eprintln!("{e}");
            print_usage();
            e
        },
    )?;

    if cli.command == Command::Help {
        print_usage();
        return Ok(());
    }

    prepare_sqlite_file(&cli.db_url)?;
    let clock = build_clock(cli.today, cli.settings.utc_offset());
    let services = AppServices::new_sqlite(&cli.db_url, clock, cli.settings.clone()).await?;
    let study = services.study();
    tracing::info!(today = %study.today(), "study service ready");

    match cli.command {
        Command::Help => {}
        Command::Add { learner, words } => {
            let mut added = Vec::with_capacity(words.len());
            for word in words {
                added.push(study.add_word(learner, word).await?);
            }
            print_json(&added)?;
        }
        Command::Remove { learner, word } => {
            let removed = study.remove_word(learner, word).await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Stats { learner } => {
            print_json(&study.get_stats(learner, None).await?)?;
        }
        Command::List {
            learner,
            bucket,
            limit,
            sort,
            skip,
        } => {
            let mut request = WordListRequest::new(bucket, limit).with_skip(skip);
            if let Some(sort) = sort {
                request = request.with_sort(sort);
            }
            print_json(&study.get_word_list(learner, request).await?)?;
        }
        Command::Apply {
            learner,
            word,
            action,
        } => {
            let outcome = study.apply_action(learner, word, action, None).await?;
            print_json(&outcome)?;
        }
        Command::Daily { learner, from, to } => {
            print_json(&study.get_daily_stats(learner, from, to).await?)?;
        }
        Command::Heatmap { learner, from, to } => {
            print_json(&study.heatmap(learner, from, to).await?)?;
        }
        Command::Progress { learner } => {
            print_json(&study.progress_overview(learner).await?)?;
        }
    }

    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.starts_with("sqlite:file:") {
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
