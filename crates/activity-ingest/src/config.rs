//! Explicit run configuration. Built once from the CLI and passed down;
//! nothing reads the environment after startup.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::discord_api_client::{DEFAULT_DISCORD_API_BASE, DISCORD_SOURCE_LABEL};
use crate::error::{IngestError, IngestResult};
use crate::github_api_client::{RepoRef, DEFAULT_GITHUB_API_BASE};
use crate::identity::{DirectorySource, DEFAULT_MEMBERS_SOURCE};
use crate::retry::ThrottlePolicy;

pub const DEFAULT_DISCORD_CHANNEL_ID: &str = "1381317464805085204";
pub const DEFAULT_DISCORD_GUILD_ID: &str = "1378710940807073913";
pub const DEFAULT_GITHUB_OWNER: &str = "anthrotech-dev";
pub const DEFAULT_GITHUB_REPO: &str = "anthrotech-dev";
pub const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_DIRECTORY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RUN_DEADLINE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel_id: String,
    pub guild_id: String,
    pub filter_joins_by_window: bool,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub repo: RepoRef,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub discord: DiscordConfig,
    pub github: GithubConfig,
    pub members_source: DirectorySource,
    pub timezone: Tz,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub directory_timeout: Duration,
    pub run_deadline: Duration,
    pub throttle: ThrottlePolicy,
    pub dry_run: bool,
    pub report_path: Option<PathBuf>,
}

impl IngestConfig {
    /// Defaults for everything except credentials.
    pub fn with_discord_token(bot_token: impl Into<String>) -> IngestResult<Self> {
        Ok(Self {
            discord: DiscordConfig {
                api_base: DEFAULT_DISCORD_API_BASE.to_string(),
                bot_token: bot_token.into(),
                channel_id: DEFAULT_DISCORD_CHANNEL_ID.to_string(),
                guild_id: DEFAULT_DISCORD_GUILD_ID.to_string(),
                filter_joins_by_window: false,
            },
            github: GithubConfig {
                api_base: DEFAULT_GITHUB_API_BASE.to_string(),
                token: None,
                repo: RepoRef::new(DEFAULT_GITHUB_OWNER, DEFAULT_GITHUB_REPO)?,
            },
            members_source: DirectorySource::parse(DEFAULT_MEMBERS_SOURCE),
            timezone: chrono_tz::Asia::Tokyo,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            directory_timeout: Duration::from_millis(DEFAULT_DIRECTORY_TIMEOUT_MS),
            run_deadline: Duration::from_secs(DEFAULT_RUN_DEADLINE_SECS),
            throttle: ThrottlePolicy::default(),
            dry_run: false,
            report_path: None,
        })
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(IngestError::InvalidConfig(format!(
                "{DISCORD_SOURCE_LABEL} bot token is required"
            )));
        }
        for (name, value) in [
            ("discord channel id", &self.discord.channel_id),
            ("discord guild id", &self.discord.guild_id),
        ] {
            let value = value.trim();
            if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(IngestError::InvalidConfig(format!(
                    "{name} must be a numeric snowflake, got '{value}'"
                )));
            }
        }
        for (name, base) in [
            ("discord api base", &self.discord.api_base),
            ("github api base", &self.github.api_base),
        ] {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(IngestError::InvalidConfig(format!(
                    "{name} must be an http(s) url, got '{base}'"
                )));
            }
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(IngestError::InvalidConfig(format!(
                "page size must be in range 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        for (name, value) in [
            ("request timeout", self.request_timeout),
            ("directory timeout", self.directory_timeout),
            ("run deadline", self.run_deadline),
        ] {
            if value.is_zero() {
                return Err(IngestError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}
