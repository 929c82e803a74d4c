use activity_types::{ActivitySource, CollectedActivity};
use async_trait::async_trait;
use chrono::Utc;

use super::{ActivityCollector, CollectContext};
use crate::collection_window::CollectionWindow;
use crate::discord_api_client::{DiscordApiClient, DiscordGuildMember, DISCORD_SOURCE_LABEL};
use crate::error::IngestResult;
use crate::paginator::{FetchOutcome, PageRequest, PageSource, Paginator};
use crate::snowflake::compare_snowflakes;

/// Seed for the ascending `after` cursor; below every real member id.
pub const GUILD_MEMBERS_START_CURSOR: &str = "0";

/// Guild members in ascending id order, paged forward with `after`.
pub struct GuildMemberPages<'a> {
    client: &'a DiscordApiClient,
    guild_id: &'a str,
}

impl<'a> GuildMemberPages<'a> {
    pub fn new(client: &'a DiscordApiClient, guild_id: &'a str) -> Self {
        Self { client, guild_id }
    }
}

#[async_trait]
impl<'a> PageSource for GuildMemberPages<'a> {
    type Item = DiscordGuildMember;

    fn label(&self) -> &'static str {
        DISCORD_SOURCE_LABEL
    }

    async fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> IngestResult<FetchOutcome<DiscordGuildMember>> {
        self.client
            .guild_members_page(
                self.guild_id,
                &request.cursor,
                request.limit,
                request.attempt,
            )
            .await
    }

    /// Largest member id seen so far.
    fn next_cursor(&self, current: &str, items: &[DiscordGuildMember]) -> String {
        items
            .iter()
            .map(|member| member.user.id.as_str())
            .fold(current, |max_id, id| {
                if compare_snowflakes(id, max_id).is_gt() {
                    id
                } else {
                    max_id
                }
            })
            .to_string()
    }
}

pub fn member_to_activity(member: &DiscordGuildMember) -> CollectedActivity {
    CollectedActivity::join(&member.user.id, member.joined_at.with_timezone(&Utc))
}

/// Emits one join event per current guild member. Not window-filtered
/// unless `filter_by_window` is set.
pub struct DiscordJoinCollector {
    client: DiscordApiClient,
    guild_id: String,
    filter_by_window: bool,
}

impl DiscordJoinCollector {
    pub fn new(client: DiscordApiClient, guild_id: impl Into<String>, filter_by_window: bool) -> Self {
        Self {
            client,
            guild_id: guild_id.into(),
            filter_by_window,
        }
    }
}

#[async_trait]
impl ActivityCollector for DiscordJoinCollector {
    fn source(&self) -> ActivitySource {
        ActivitySource::DiscordJoins
    }

    async fn collect(
        &self,
        window: &CollectionWindow,
        context: &CollectContext,
    ) -> IngestResult<Vec<CollectedActivity>> {
        let pages = GuildMemberPages::new(&self.client, &self.guild_id);
        let mut paginator = Paginator::new(
            &pages,
            GUILD_MEMBERS_START_CURSOR,
            context.page_size,
            context.throttle,
            context.deadline,
        );

        let mut collected = Vec::new();
        let mut outside_window = 0_usize;
        while let Some(page) = paginator.next_page().await? {
            for member in &page {
                let activity = member_to_activity(member);
                if self.filter_by_window && !window.contains(activity.timestamp) {
                    outside_window = outside_window.saturating_add(1);
                    continue;
                }
                collected.push(activity);
            }
        }

        tracing::info!(
            guild_id = %self.guild_id,
            pages = paginator.pages_fetched(),
            collected = collected.len(),
            outside_window,
            "discord join collection finished"
        );
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::{member_to_activity, GuildMemberPages};
    use crate::discord_api_client::{DiscordApiClient, DiscordGuildMember};
    use crate::paginator::PageSource;
    use activity_types::ActivityKind;
    use std::time::Duration;

    fn member(id: &str) -> DiscordGuildMember {
        serde_json::from_value(serde_json::json!({
            "user": {"id": id, "username": format!("user-{id}")},
            "joined_at": "2025-06-01T09:00:00+09:00"
        }))
        .expect("decode member")
    }

    #[test]
    fn unit_join_transform_marks_special_event_without_body() {
        let activity = member_to_activity(&member("111"));
        assert_eq!(activity.id, "join-111");
        assert_eq!(activity.native_author_id, "111");
        assert_eq!(activity.kind, ActivityKind::Join);
        assert!(activity.is_special);
        assert!(activity.body.is_empty());
        assert_eq!(activity.timestamp.to_rfc3339(), "2025-06-01T00:00:00+00:00");
    }

    #[test]
    fn regression_next_cursor_uses_numeric_maximum() {
        let client = DiscordApiClient::new("http://localhost", "token", Duration::from_secs(1))
            .expect("client");
        let pages = GuildMemberPages::new(&client, "guild");
        let items = vec![member("999"), member("1000"), member("998")];
        assert_eq!(pages.next_cursor("0", &items), "1000");
        assert_eq!(pages.next_cursor("5000", &items), "5000");
    }
}
