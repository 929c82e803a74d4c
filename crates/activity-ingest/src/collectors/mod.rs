//! Per-source collectors. Each drains its endpoint through a [`Paginator`]
//! and maps raw items to [`CollectedActivity`] values.
//!
//! [`Paginator`]: crate::paginator::Paginator

mod discord_joins;
mod discord_messages;
mod github_commits;

use activity_types::{ActivitySource, CollectedActivity};
use async_trait::async_trait;

use crate::collection_window::CollectionWindow;
use crate::deadline::RunDeadline;
use crate::error::IngestResult;
use crate::retry::ThrottlePolicy;

pub use discord_joins::{member_to_activity, DiscordJoinCollector, GuildMemberPages};
pub use discord_messages::{message_to_activity, ChannelMessagePages, DiscordMessageCollector};
pub use github_commits::{commit_to_activity, CommitPages, GithubCommitCollector};

/// Run-wide settings every collector shares.
#[derive(Debug, Clone, Copy)]
pub struct CollectContext {
    pub page_size: usize,
    pub throttle: ThrottlePolicy,
    pub deadline: RunDeadline,
}

/// Trait contract for one activity source.
#[async_trait]
pub trait ActivityCollector: Send + Sync {
    fn source(&self) -> ActivitySource;

    /// Drains the source for `window`. Any error aborts the whole run.
    async fn collect(
        &self,
        window: &CollectionWindow,
        context: &CollectContext,
    ) -> IngestResult<Vec<CollectedActivity>>;
}
