use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_DIRECTORY_TIMEOUT_MS, DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RUN_DEADLINE_SECS, MAX_PAGE_SIZE,
};

pub const DEFAULT_DATABASE_PATH: &str = ".activity/activity.sqlite";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_page_size(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if !(1..=MAX_PAGE_SIZE).contains(&parsed) {
        return Err(format!("value must be in range 1..={MAX_PAGE_SIZE}"));
    }
    Ok(parsed)
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

#[derive(Debug, Parser)]
#[command(
    name = "activity-ingest",
    about = "Collects community activity from Discord and GitHub into an activity store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect the trailing window from every source and upsert it.
    Run(RunArgs),
    /// Print stored activity projections as JSON.
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(
        long = "discord-api-base",
        env = "DISCORD_API_BASE",
        default_value = "https://discord.com/api/v10",
        help = "Base URL of the Discord REST API"
    )]
    pub discord_api_base: String,

    #[arg(
        long = "discord-bot-token",
        env = "DISCORD_BOT_TOKEN",
        hide_env_values = true,
        help = "Discord bot token used for channel history and guild member listing"
    )]
    pub discord_bot_token: String,

    #[arg(
        long = "discord-channel-id",
        env = "DISCORD_CHANNEL_ID",
        default_value = crate::config::DEFAULT_DISCORD_CHANNEL_ID,
        help = "Channel whose messages count as activity"
    )]
    pub discord_channel_id: String,

    #[arg(
        long = "discord-guild-id",
        env = "DISCORD_GUILD_ID",
        default_value = crate::config::DEFAULT_DISCORD_GUILD_ID,
        help = "Guild whose member joins count as activity"
    )]
    pub discord_guild_id: String,

    #[arg(
        long = "filter-joins-by-window",
        env = "ACTIVITY_FILTER_JOINS_BY_WINDOW",
        default_value_t = false,
        help = "Keep only join events inside the collection window (default keeps every current member)"
    )]
    pub filter_joins_by_window: bool,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "Base URL of the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Optional GitHub token; unauthenticated requests have a lower rate limit"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-owner",
        env = "GITHUB_OWNER",
        default_value = crate::config::DEFAULT_GITHUB_OWNER,
        help = "Owner of the repository whose commits count as activity"
    )]
    pub github_owner: String,

    #[arg(
        long = "github-repo",
        env = "GITHUB_REPO",
        default_value = crate::config::DEFAULT_GITHUB_REPO,
        help = "Repository whose commits count as activity"
    )]
    pub github_repo: String,

    #[arg(
        long = "members-source",
        env = "ACTIVITY_MEMBERS_SOURCE",
        default_value = crate::identity::DEFAULT_MEMBERS_SOURCE,
        help = "Membership directory JSON, as an http(s) URL or a local file path"
    )]
    pub members_source: String,

    #[arg(
        long = "database",
        env = "ACTIVITY_DB_PATH",
        default_value = DEFAULT_DATABASE_PATH,
        help = "SQLite database the activities are upserted into"
    )]
    pub database: PathBuf,

    #[arg(
        long = "timezone",
        env = "ACTIVITY_TIMEZONE",
        default_value = crate::config::DEFAULT_TIMEZONE,
        help = "IANA timezone whose calendar days define the collection window"
    )]
    pub timezone: String,

    #[arg(
        long = "page-size",
        env = "ACTIVITY_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = parse_page_size,
        help = "Items requested per page from every source"
    )]
    pub page_size: usize,

    #[arg(
        long = "request-timeout-ms",
        env = "ACTIVITY_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for source API calls"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "directory-timeout-ms",
        env = "ACTIVITY_DIRECTORY_TIMEOUT_MS",
        default_value_t = DEFAULT_DIRECTORY_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Timeout for fetching the membership directory"
    )]
    pub directory_timeout_ms: u64,

    #[arg(
        long = "run-deadline-secs",
        env = "ACTIVITY_RUN_DEADLINE_SECS",
        default_value_t = DEFAULT_RUN_DEADLINE_SECS,
        value_parser = parse_positive_u64,
        help = "Upper bound on one whole run, including throttle backoff"
    )]
    pub run_deadline_secs: u64,

    #[arg(
        long = "max-throttle-retries",
        env = "ACTIVITY_MAX_THROTTLE_RETRIES",
        help = "Give up after this many throttled retries of one page (default: retry until the run deadline)"
    )]
    pub max_throttle_retries: Option<usize>,

    #[arg(
        long = "dry-run",
        default_value_t = false,
        help = "Collect and resolve, log the batch, and skip persistence"
    )]
    pub dry_run: bool,

    #[arg(
        long = "report-path",
        env = "ACTIVITY_REPORT_PATH",
        help = "Optional path for a JSON run report"
    )]
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[arg(
        long = "database",
        env = "ACTIVITY_DB_PATH",
        default_value = DEFAULT_DATABASE_PATH,
        help = "SQLite database to read"
    )]
    pub database: PathBuf,

    #[arg(long = "user", help = "Canonical member id (GitHub login)")]
    pub user: String,

    #[arg(long = "since", value_parser = parse_date, help = "First day of daily counts (default: one year before --until)")]
    pub since: Option<NaiveDate>,

    #[arg(long = "until", value_parser = parse_date, help = "Last day of daily counts (default: today, UTC)")]
    pub until: Option<NaiveDate>,

    #[arg(
        long = "date",
        value_parser = parse_date,
        conflicts_with_all = ["since", "until", "total"],
        help = "List the member's activities on one UTC day"
    )]
    pub date: Option<NaiveDate>,

    #[arg(
        long = "total",
        default_value_t = false,
        conflicts_with_all = ["since", "until"],
        help = "Print the member's all-time activity count"
    )]
    pub total: bool,
}
