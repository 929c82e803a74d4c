use activity_types::{ActivitySource, CollectedActivity};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{ActivityCollector, CollectContext};
use crate::collection_window::CollectionWindow;
use crate::discord_api_client::{
    DiscordApiClient, DiscordMessage, DISCORD_DEFAULT_MESSAGE_TYPE, DISCORD_SOURCE_LABEL,
};
use crate::error::IngestResult;
use crate::paginator::{FetchOutcome, PageRequest, PageSource, Paginator};
use crate::snowflake::SnowflakeCodec;

/// Channel history, newest first, paged backwards with `before`.
pub struct ChannelMessagePages<'a> {
    client: &'a DiscordApiClient,
    channel_id: &'a str,
}

impl<'a> ChannelMessagePages<'a> {
    pub fn new(client: &'a DiscordApiClient, channel_id: &'a str) -> Self {
        Self { client, channel_id }
    }
}

#[async_trait]
impl<'a> PageSource for ChannelMessagePages<'a> {
    type Item = DiscordMessage;

    fn label(&self) -> &'static str {
        DISCORD_SOURCE_LABEL
    }

    async fn fetch_page(&self, request: &PageRequest) -> IngestResult<FetchOutcome<DiscordMessage>> {
        self.client
            .channel_messages_page(
                self.channel_id,
                &request.cursor,
                request.limit,
                request.attempt,
            )
            .await
    }

    fn next_cursor(&self, current: &str, items: &[DiscordMessage]) -> String {
        items
            .last()
            .map(|message| message.id.clone())
            .unwrap_or_else(|| current.to_string())
    }
}

pub fn message_to_activity(message: &DiscordMessage) -> CollectedActivity {
    CollectedActivity::message(
        &message.id,
        message.author.id.clone(),
        message.timestamp.with_timezone(&Utc),
        message.content.clone(),
    )
}

pub struct DiscordMessageCollector {
    client: DiscordApiClient,
    channel_id: String,
}

impl DiscordMessageCollector {
    pub fn new(client: DiscordApiClient, channel_id: impl Into<String>) -> Self {
        Self {
            client,
            channel_id: channel_id.into(),
        }
    }
}

#[async_trait]
impl ActivityCollector for DiscordMessageCollector {
    fn source(&self) -> ActivitySource {
        ActivitySource::DiscordMessages
    }

    async fn collect(
        &self,
        window: &CollectionWindow,
        context: &CollectContext,
    ) -> IngestResult<Vec<CollectedActivity>> {
        let pages = ChannelMessagePages::new(&self.client, &self.channel_id);
        // `before` is exclusive; step one millisecond past the inclusive end.
        let start_cursor =
            SnowflakeCodec::DISCORD.cursor_for_time(window.end + Duration::milliseconds(1));
        let mut paginator = Paginator::new(
            &pages,
            start_cursor,
            context.page_size,
            context.throttle,
            context.deadline,
        );

        let mut collected = Vec::new();
        'pages: while let Some(page) = paginator.next_page().await? {
            for message in &page {
                let at = message.timestamp.with_timezone(&Utc);
                if window.is_before_start(at) {
                    tracing::debug!(message_id = %message.id, "reached window start");
                    break 'pages;
                }
                if message.kind != DISCORD_DEFAULT_MESSAGE_TYPE || !window.contains(at) {
                    continue;
                }
                tracing::debug!(
                    message_id = %message.id,
                    author_id = %message.author.id,
                    author = %message.author.username,
                    "collected discord message"
                );
                collected.push(message_to_activity(message));
            }
        }

        tracing::info!(
            channel_id = %self.channel_id,
            pages = paginator.pages_fetched(),
            collected = collected.len(),
            "discord message collection finished"
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::message_to_activity;
    use crate::discord_api_client::DiscordMessage;
    use activity_types::{ActivityKind, ActivitySource};
    use chrono::{TimeZone, Utc};

    #[test]
    fn unit_message_transform_keeps_native_author_for_later_resolution() {
        let message: DiscordMessage = serde_json::from_str(
            r#"{
                "id": "900",
                "type": 0,
                "content": "hello",
                "timestamp": "2025-06-01T12:00:00+00:00",
                "author": {"id": "111", "username": "alice"}
            }"#,
        )
        .expect("decode message");

        let activity = message_to_activity(&message);
        assert_eq!(activity.id, "discord-900");
        assert_eq!(activity.native_author_id, "111");
        assert_eq!(activity.source, ActivitySource::DiscordMessages);
        assert_eq!(activity.kind, ActivityKind::Common);
        assert_eq!(activity.body, "hello");
        assert!(!activity.is_special);
        assert_eq!(
            activity.timestamp,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        );
    }
}
