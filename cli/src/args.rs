//! The flag surface and its translation into engine configuration.
//!
//! Durations accept either `key=value` pairs (`weeks=2,days=1`) or compact
//! form (`2w1d`); sleep settings accept a fixed value (`1.5`) or a sampled
//! range (`1.5,2`). All of that parsing lives in `cordsweep-types`; this
//! module only wires it into clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use cordsweep_core::{CountMode, RetentionPolicy, ScopeResolver, SweepOptions};
use cordsweep_store::{FetchWindow, RetryPolicy};
use cordsweep_types::{DurationRange, ScopeId, UserId, parse_delta};

#[derive(Debug, Parser)]
#[command(
    name = "cordsweep",
    version,
    about = "Sweep your own messages and reactions from your Discord account, \
             keeping the newest and most recent"
)]
pub struct Args {
    /// Only process these guild, category, or channel IDs (and their
    /// descendants). An include overrides an exclude at any level.
    #[arg(short = 'i', long = "include-ids", value_name = "ID", num_args = 1..)]
    pub include_ids: Vec<ScopeId>,

    /// Skip these guild, category, or channel IDs (and their descendants).
    #[arg(short = 'x', long = "exclude-ids", value_name = "ID", num_args = 1..)]
    pub exclude_ids: Vec<ScopeId>,

    /// Classify and log without deleting anything.
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Log verbosity (overridden by RUST_LOG when set).
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Emit listings and the run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Retries allowed per request beyond the initial attempt.
    #[arg(short = 'r', long, value_name = "N", default_value_t = 5)]
    pub max_retries: u32,

    /// Seconds added on top of the server-reported rate-limit wait.
    #[arg(
        short = 'b',
        long,
        value_name = "SECS[,SECS]",
        default_value = "25,35"
    )]
    pub retry_time_buffer: DurationRange,

    /// Seconds to pause between message page fetches.
    #[arg(
        short = 'f',
        long,
        value_name = "SECS[,SECS]",
        default_value = "0.2,0.4"
    )]
    pub fetch_sleep_time: DurationRange,

    /// Seconds to pause after each delete.
    #[arg(short = 's', long, value_name = "SECS[,SECS]", default_value = "1.5,2")]
    pub delete_sleep_time: DurationRange,

    /// Keep this many of the newest messages per channel. Zero keeps none.
    #[arg(short = 'n', long, value_name = "N", default_value_t = 12)]
    pub preserve_n: u32,

    /// What counts toward --preserve-n: only your own messages, or every
    /// message in the channel.
    #[arg(long, value_enum, default_value_t = CountModeArg::Mine)]
    pub preserve_n_mode: CountModeArg,

    /// Keep messages younger than this (e.g. `weeks=2`, `3d12h`). Zero
    /// disables age-based preservation.
    #[arg(
        short = 'p',
        long,
        value_name = "DELTA",
        value_parser = parse_delta,
        default_value = "weeks=2"
    )]
    pub preserve_last: Duration,

    /// Do not fetch messages older than this at all.
    #[arg(short = 'a', long, value_name = "DELTA", value_parser = parse_delta)]
    pub fetch_max_age: Option<Duration>,

    /// Stop fetching after this many messages per channel.
    #[arg(short = 'm', long, value_name = "N")]
    pub max_messages: Option<u64>,

    /// Also remove your reactions from messages you cannot delete.
    #[arg(short = 'R', long)]
    pub delete_reactions: bool,

    /// List the account's guilds and exit.
    #[arg(short = 'g', long)]
    pub list_guilds: bool,

    /// List the in-scope channels grouped by guild and category, then exit.
    #[arg(short = 'c', long)]
    pub list_channels: bool,

    /// Remember preserved message IDs between runs, so a narrow
    /// --fetch-max-age window does not forget older preserved messages.
    #[arg(long)]
    pub preserve_cache: bool,

    /// Where to keep the preserve cache (implies --preserve-cache).
    #[arg(long, value_name = "PATH")]
    pub preserve_cache_path: Option<PathBuf>,

    /// Delete the preserve cache file and exit.
    #[arg(long)]
    pub wipe_preserve_cache: bool,
}

/// Whether `--json` appears anywhere on the command line.
///
/// Checked against the raw argv when argument parsing itself fails, so
/// even the error for a malformed flag honors the output format.
pub fn wants_json(argv: impl IntoIterator<Item = String>) -> bool {
    argv.into_iter().skip(1).any(|a| a == "--json")
}

/// An argument error as a single JSON object on one line.
#[must_use]
pub fn json_error_payload(err: &clap::Error) -> String {
    serde_json::json!({ "error": err.render().to_string().trim() }).to_string()
}

/// Report an argument error and exit. With `--json` on the command line
/// the error goes to stdout as JSON with exit status 2; otherwise clap
/// renders it as usual.
pub fn exit_argument_error(err: clap::Error) -> ! {
    if wants_json(std::env::args()) {
        println!("{}", json_error_payload(&err));
        std::process::exit(2);
    }
    err.exit()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CountModeArg {
    Mine,
    All,
}

impl From<CountModeArg> for CountMode {
    fn from(mode: CountModeArg) -> Self {
        match mode {
            CountModeArg::Mine => Self::Mine,
            CountModeArg::All => Self::All,
        }
    }
}

impl Args {
    pub fn scope_resolver(&self) -> ScopeResolver {
        ScopeResolver::new(self.include_ids.iter().copied(), self.exclude_ids.iter().copied())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_buffer: self.retry_time_buffer,
        }
    }

    pub fn retention_policy(&self, current_user: UserId) -> RetentionPolicy {
        RetentionPolicy {
            preserve_n: self.preserve_n,
            count_mode: self.preserve_n_mode.into(),
            preserve_last: self.preserve_last,
            delete_reactions: self.delete_reactions,
            current_user,
        }
    }

    pub fn sweep_options(&self, now: chrono::DateTime<chrono::Utc>) -> SweepOptions {
        let cutoff = self
            .fetch_max_age
            .and_then(|age| chrono::TimeDelta::from_std(age).ok())
            .map(|age| now - age);
        SweepOptions {
            dry_run: self.dry_run,
            fetch_window: FetchWindow {
                cutoff,
                max_messages: self.max_messages,
            },
            fetch_sleep: self.fetch_sleep_time,
            delete_sleep: self.delete_sleep_time,
        }
    }

    pub fn cache_enabled(&self) -> bool {
        self.preserve_cache || self.preserve_cache_path.is_some()
    }
}
