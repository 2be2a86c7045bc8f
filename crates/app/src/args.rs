use std::fmt;

use vocab_core::ValidationError;
use vocab_core::model::{
    LearnerId, SettingsError, SortField, SortOrder, SortSpec, StudyDate, StudySettings,
    StudySettingsDraft, WordId,
};
use vocab_core::scheduler::{Bucket, ReviewAction};

pub const DEFAULT_DB_URL: &str = "sqlite://vocab.sqlite3";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    Validation(ValidationError),
    Settings(SettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Validation(err) => write!(f, "{err}"),
            ArgsError::Settings(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<ValidationError> for ArgsError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<SettingsError> for ArgsError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_flag<T: std::str::FromStr>(flag: &'static str, raw: &str) -> Result<T, ArgsError> {
    raw.trim().parse::<T>().map_err(|_| ArgsError::InvalidValue {
        flag,
        raw: raw.to_owned(),
    })
}

/// `field[:order]`, e.g. `updated_at:desc`.
fn parse_sort(raw: &str) -> Result<SortSpec, ArgsError> {
    let (field, order) = raw.split_once(':').unwrap_or((raw, "asc"));
    Ok(SortSpec::new(
        field.parse::<SortField>()?,
        order.parse::<SortOrder>()?,
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Add {
        learner: LearnerId,
        words: Vec<WordId>,
    },
    Remove {
        learner: LearnerId,
        word: WordId,
    },
    Stats {
        learner: LearnerId,
    },
    List {
        learner: LearnerId,
        bucket: Bucket,
        limit: u32,
        sort: Option<SortSpec>,
        skip: u32,
    },
    Apply {
        learner: LearnerId,
        word: WordId,
        action: ReviewAction,
    },
    Daily {
        learner: LearnerId,
        from: Option<StudyDate>,
        to: Option<StudyDate>,
    },
    Heatmap {
        learner: LearnerId,
        from: Option<StudyDate>,
        to: Option<StudyDate>,
    },
    Progress {
        learner: LearnerId,
    },
}

/// Parsed command line with settings resolved from defaults, env and flags.
#[derive(Debug, Clone)]
pub struct Cli {
    pub db_url: String,
    pub settings: StudySettings,
    pub today: Option<StudyDate>,
    pub command: Command,
}

#[derive(Default)]
struct Flags {
    limit: Option<u32>,
    sort: Option<SortSpec>,
    skip: Option<u32>,
    from: Option<StudyDate>,
    to: Option<StudyDate>,
}

impl Cli {
    /// Parse `args` (without the program name), reading defaults through `env`.
    pub fn parse_from(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("VOCAB_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut draft = StudySettingsDraft::new();
        if let Some(raw) = env("VOCAB_UTC_OFFSET") {
            draft.utc_offset_hours = Some(parse_flag("VOCAB_UTC_OFFSET", &raw)?);
        }
        if let Some(raw) = env("VOCAB_DAILY_NEW_LIMIT") {
            draft.daily_new_limit = Some(parse_flag("VOCAB_DAILY_NEW_LIMIT", &raw)?);
        }
        let mut today = None;
        let mut flags = Flags::default();
        let mut positional: Vec<String> = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--utc-offset" => {
                    let value = require_value(&mut args, "--utc-offset")?;
                    draft.utc_offset_hours = Some(parse_flag("--utc-offset", &value)?);
                }
                "--daily-limit" => {
                    let value = require_value(&mut args, "--daily-limit")?;
                    draft.daily_new_limit = Some(parse_flag("--daily-limit", &value)?);
                }
                "--today" => {
                    let value = require_value(&mut args, "--today")?;
                    today = Some(value.parse::<StudyDate>()?);
                }
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    flags.limit = Some(parse_flag("--limit", &value)?);
                }
                "--skip" => {
                    let value = require_value(&mut args, "--skip")?;
                    flags.skip = Some(parse_flag("--skip", &value)?);
                }
                "--sort" => {
                    let value = require_value(&mut args, "--sort")?;
                    flags.sort = Some(parse_sort(&value)?);
                }
                "--from" => {
                    let value = require_value(&mut args, "--from")?;
                    flags.from = Some(value.parse::<StudyDate>()?);
                }
                "--to" => {
                    let value = require_value(&mut args, "--to")?;
                    flags.to = Some(value.parse::<StudyDate>()?);
                }
                "--help" | "-h" => {
                    positional.clear();
                    positional.push("help".into());
                    break;
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let command = build_command(positional, flags)?;
        Ok(Self {
            db_url,
            settings: draft.validate()?,
            today,
            command,
        })
    }
}

fn build_command(positional: Vec<String>, flags: Flags) -> Result<Command, ArgsError> {
    let mut rest = positional.into_iter();
    let Some(name) = rest.next() else {
        return Ok(Command::Help);
    };

    let mut next = |name: &'static str| rest.next().ok_or(ArgsError::MissingArgument { name });
    let learner = |raw: String| parse_flag::<LearnerId>("<learner>", &raw);
    let word = |raw: String| parse_flag::<WordId>("<word>", &raw);

    let command = match name.as_str() {
        "help" => Command::Help,
        "add" => {
            let learner = learner(next("learner")?)?;
            let mut words = vec![word(next("word")?)?];
            while let Ok(raw) = next("word") {
                words.push(word(raw)?);
            }
            Command::Add { learner, words }
        }
        "remove" => Command::Remove {
            learner: learner(next("learner")?)?,
            word: word(next("word")?)?,
        },
        "stats" => Command::Stats {
            learner: learner(next("learner")?)?,
        },
        "list" => Command::List {
            learner: learner(next("learner")?)?,
            bucket: next("bucket")?.parse::<Bucket>()?,
            limit: flags.limit.unwrap_or(20),
            sort: flags.sort,
            skip: flags.skip.unwrap_or(0),
        },
        "apply" => Command::Apply {
            learner: learner(next("learner")?)?,
            word: word(next("word")?)?,
            action: next("action")?.parse::<ReviewAction>()?,
        },
        "daily" => Command::Daily {
            learner: learner(next("learner")?)?,
            from: flags.from,
            to: flags.to,
        },
        "heatmap" => Command::Heatmap {
            learner: learner(next("learner")?)?,
            from: flags.from,
            to: flags.to,
        },
        "progress" => Command::Progress {
            learner: learner(next("learner")?)?,
        },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };

    if let Some(extra) = rest.next() {
        return Err(ArgsError::UnknownArg(extra));
    }
    Ok(command)
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  add <learner> <word>...          Put words on a learner's list");
    eprintln!("  remove <learner> <word>          Drop a word from a learner's list");
    eprintln!("  stats <learner>                  New/review/overdue counts for today");
    eprintln!("  list <learner> <bucket>          Words in new|review|overdue");
    eprintln!("       [--limit n] [--skip n] [--sort field[:asc|desc]]");
    eprintln!("  apply <learner> <word> <action>  start|review|remember|vague|forgot");
    eprintln!("  daily <learner> [--from d] [--to d]    Daily activity counters");
    eprintln!("  heatmap <learner> [--from d] [--to d]  Activity intensity per day");
    eprintln!("  progress <learner>               Total/started/mastered counts");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --utc-offset <hours>      Offset used to decide \"today\" (default: 8)");
    eprintln!("  --daily-limit <n>         New words per day, 1..=100 (default: 20)");
    eprintln!("  --today <YYYY-MM-DD>      Pretend today is this date");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  VOCAB_DB_URL, VOCAB_UTC_OFFSET, VOCAB_DAILY_NEW_LIMIT, RUST_LOG");
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, ArgsError> {
        Cli::parse_from(args.iter().map(|s| (*s).to_string()), |_| None)
    }

    #[test]
    fn no_arguments_shows_help() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.command, Command::Help);
        assert_eq!(cli.db_url, DEFAULT_DB_URL);
        assert_eq!(cli.settings, StudySettings::default());
    }

    #[test]
    fn list_with_flags_in_any_position() {
        let cli = parse(&[
            "--limit", "5", "list", "7", "overdue", "--sort", "created:desc", "--today",
            "2024-03-01",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::List {
                learner: LearnerId::new(7),
                bucket: Bucket::Overdue,
                limit: 5,
                sort: Some(SortSpec::new(SortField::CreatedAt, SortOrder::Desc)),
                skip: 0,
            }
        );
        assert_eq!(cli.today, StudyDate::from_ymd(2024, 3, 1));
    }

    #[test]
    fn add_takes_several_words() {
        let cli = parse(&["add", "1", "10", "11"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Add {
                learner: LearnerId::new(1),
                words: vec![WordId::new(10), WordId::new(11)],
            }
        );
    }

    #[test]
    fn env_sets_defaults_and_flags_override() {
        let env = |key: &str| match key {
            "VOCAB_DAILY_NEW_LIMIT" => Some("30".to_string()),
            "VOCAB_UTC_OFFSET" => Some("0".to_string()),
            _ => None,
        };
        let cli = Cli::parse_from(
            ["--daily-limit", "40", "stats", "1"].map(String::from),
            env,
        )
        .unwrap();
        assert_eq!(cli.settings.daily_limit().get(), 40);
        assert_eq!(cli.settings.utc_offset().local_minus_utc(), 0);
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(
            parse(&["apply", "1", "2", "guess"]),
            Err(ArgsError::Validation(ValidationError::UnknownAction(_)))
        ));
        assert!(matches!(
            parse(&["apply", "1", "2"]),
            Err(ArgsError::MissingArgument { name: "action" })
        ));
        assert!(matches!(
            parse(&["--daily-limit", "0", "stats", "1"]),
            Err(ArgsError::Settings(SettingsError::InvalidDailyLimit(0)))
        ));
        assert!(matches!(
            parse(&["frobnicate"]),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse(&["stats", "1", "extra"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/vocab.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/vocab.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
