//! Scheduled ingestion of community activity.
//!
//! A run computes a trailing [`CollectionWindow`], drains Discord channel
//! history, Discord guild joins and GitHub commits through a throttle-aware
//! [`Paginator`], resolves every source-native author against the
//! membership directory, and upserts the resolved batch into an
//! [`activity_store::ActivityStore`].

pub mod bootstrap;
pub mod cli_args;
pub mod cli_commands;
pub mod collection_window;
pub mod collectors;
pub mod config;
pub mod deadline;
pub mod discord_api_client;
pub mod error;
pub mod github_api_client;
mod http_transport;
pub mod identity;
pub mod orchestrator;
pub mod paginator;
pub mod retry;
pub mod run_report;
pub mod snowflake;

pub use collection_window::{parse_timezone, CollectionWindow};
pub use config::{DiscordConfig, GithubConfig, IngestConfig};
pub use deadline::RunDeadline;
pub use error::{IngestError, IngestResult};
pub use identity::{
    load_membership_directory, DirectoryEntry, DirectorySource, IdentityResolver,
    MembershipDirectory,
};
pub use orchestrator::{resolve_activities, run_ingestion, IngestionOrchestrator};
pub use paginator::{FetchOutcome, PageRequest, PageSource, Paginator};
pub use retry::{parse_retry_after, retry_after_from_str, ThrottlePolicy};
pub use run_report::{write_run_report, RunReport, SourceReport};
pub use snowflake::{compare_snowflakes, SnowflakeCodec};
