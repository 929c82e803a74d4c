//! Discord REST client for channel history and guild membership pages.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::IngestResult;
use crate::http_transport::{build_http_client, fetch_json_page};
use crate::paginator::FetchOutcome;
use crate::retry::parse_retry_after;

pub const DISCORD_SOURCE_LABEL: &str = "discord";
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord message type for ordinary user messages.
pub const DISCORD_DEFAULT_MESSAGE_TYPE: u32 = 0;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordMessage {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: u32,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<FixedOffset>,
    pub author: DiscordUser,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordGuildMember {
    pub user: DiscordUser,
    pub joined_at: DateTime<FixedOffset>,
}

#[derive(Clone)]
pub struct DiscordApiClient {
    http: reqwest::Client,
    api_base: String,
}

impl DiscordApiClient {
    pub fn new(api_base: &str, bot_token: &str, request_timeout: Duration) -> IngestResult<Self> {
        let authorization = format!("Bot {}", bot_token.trim());
        let http = build_http_client(
            DISCORD_SOURCE_LABEL,
            Some(authorization.as_str()),
            "application/json",
            &[],
            request_timeout,
        )?;
        Ok(Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Messages strictly older than `before`, newest first.
    pub async fn channel_messages_page(
        &self,
        channel_id: &str,
        before: &str,
        limit: usize,
        attempt: usize,
    ) -> IngestResult<FetchOutcome<DiscordMessage>> {
        let request = self
            .http
            .get(format!("{}/channels/{channel_id}/messages", self.api_base))
            .query(&[("limit", limit.to_string()), ("before", before.to_string())]);
        fetch_json_page(DISCORD_SOURCE_LABEL, request, attempt, discord_throttle_hint).await
    }

    /// Members with ids strictly greater than `after`, ascending.
    pub async fn guild_members_page(
        &self,
        guild_id: &str,
        after: &str,
        limit: usize,
        attempt: usize,
    ) -> IngestResult<FetchOutcome<DiscordGuildMember>> {
        let request = self
            .http
            .get(format!("{}/guilds/{guild_id}/members", self.api_base))
            .query(&[("limit", limit.to_string()), ("after", after.to_string())]);
        fetch_json_page(DISCORD_SOURCE_LABEL, request, attempt, discord_throttle_hint).await
    }
}

fn discord_throttle_hint(status: StatusCode, headers: &HeaderMap) -> Option<Option<Duration>> {
    (status == StatusCode::TOO_MANY_REQUESTS).then(|| parse_retry_after(headers))
}
