//! Sequences collectors, resolves authors, and submits one batch per run.
//!
//! Collection is all-or-nothing: the first collector error aborts the run
//! before anything is written. Persistence is per-record best-effort.

use activity_store::ActivityStore;
use activity_types::{Activity, CollectedActivity};
use chrono::{DateTime, Utc};

use crate::collection_window::CollectionWindow;
use crate::collectors::{
    ActivityCollector, CollectContext, DiscordJoinCollector, DiscordMessageCollector,
    GithubCommitCollector,
};
use crate::config::IngestConfig;
use crate::deadline::RunDeadline;
use crate::discord_api_client::DiscordApiClient;
use crate::error::IngestResult;
use crate::github_api_client::GithubApiClient;
use crate::identity::{load_membership_directory, IdentityResolver};
use crate::run_report::{RunReport, SourceReport};

/// Resolves every collected record, dropping those whose author is not a
/// directory member.
pub fn resolve_activities(
    collected: Vec<CollectedActivity>,
    resolver: &IdentityResolver,
) -> (Vec<Activity>, usize) {
    let mut resolved = Vec::with_capacity(collected.len());
    let mut dropped = 0_usize;
    for activity in collected {
        let canonical = resolver
            .resolve(activity.identity_namespace(), &activity.native_author_id)
            .map(str::to_string);
        match canonical {
            Some(user_id) => resolved.push(activity.resolve(user_id)),
            None => {
                tracing::debug!(
                    activity_id = %activity.id,
                    source = %activity.source,
                    "dropping activity from non-member"
                );
                dropped = dropped.saturating_add(1);
            }
        }
    }
    (resolved, dropped)
}

pub struct IngestionOrchestrator<'a> {
    collectors: Vec<Box<dyn ActivityCollector + 'a>>,
    resolver: IdentityResolver,
    store: &'a dyn ActivityStore,
    context: CollectContext,
    dry_run: bool,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(
        collectors: Vec<Box<dyn ActivityCollector + 'a>>,
        resolver: IdentityResolver,
        store: &'a dyn ActivityStore,
        context: CollectContext,
    ) -> Self {
        Self {
            collectors,
            resolver,
            store,
            context,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, window: &CollectionWindow) -> IngestResult<RunReport> {
        let mut batch = Vec::new();
        let mut sources = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            let source = collector.source();
            tracing::info!(source = %source, "collecting");
            let collected = collector.collect(window, &self.context).await?;
            let collected_count = collected.len();
            let (resolved, dropped) = resolve_activities(collected, &self.resolver);
            sources.push(SourceReport {
                source,
                collected: collected_count,
                resolved: resolved.len(),
                dropped,
            });
            batch.extend(resolved);
        }

        let mut report = RunReport {
            window: *window,
            sources,
            batch_size: batch.len(),
            written: 0,
            failed_ids: Vec::new(),
            dry_run: self.dry_run,
        };

        if self.dry_run {
            match serde_json::to_string_pretty(&batch) {
                Ok(rendered) => tracing::info!(batch = %rendered, "dry run, skipping persistence"),
                Err(error) => tracing::warn!(error = %error, "failed to render dry-run batch"),
            }
            return Ok(report);
        }

        let outcome = self.store.upsert_batch(&batch).await;
        report.written = outcome.written;
        report.failed_ids = outcome
            .failures
            .into_iter()
            .map(|failure| failure.activity_id)
            .collect();
        Ok(report)
    }
}

/// One full ingestion run against the live sources described by `config`.
pub async fn run_ingestion(
    config: &IngestConfig,
    store: &dyn ActivityStore,
    now: DateTime<Utc>,
) -> IngestResult<RunReport> {
    config.validate()?;
    let deadline = RunDeadline::after(config.run_deadline);
    let window = CollectionWindow::trailing_days(now, config.timezone)?;
    tracing::info!(
        window_start = %window.start,
        window_end = %window.end,
        timezone = %config.timezone.name(),
        "starting ingestion run"
    );

    deadline.check("membership directory load")?;
    let directory_timeout = config.directory_timeout.min(deadline.remaining());
    let directory = load_membership_directory(&config.members_source, directory_timeout).await?;
    let resolver = IdentityResolver::new(&directory);

    let request_timeout = config.request_timeout;
    let discord_client = DiscordApiClient::new(
        &config.discord.api_base,
        &config.discord.bot_token,
        request_timeout,
    )?;
    let github_client = GithubApiClient::new(
        &config.github.api_base,
        config.github.token.as_deref(),
        config.github.repo.clone(),
        request_timeout,
    )?;

    let collectors: Vec<Box<dyn ActivityCollector>> = vec![
        Box::new(DiscordMessageCollector::new(
            discord_client.clone(),
            config.discord.channel_id.clone(),
        )),
        Box::new(DiscordJoinCollector::new(
            discord_client,
            config.discord.guild_id.clone(),
            config.discord.filter_joins_by_window,
        )),
        Box::new(GithubCommitCollector::new(github_client)),
    ];
    let context = CollectContext {
        page_size: config.page_size,
        throttle: config.throttle,
        deadline,
    };

    IngestionOrchestrator::new(collectors, resolver, store, context)
        .with_dry_run(config.dry_run)
        .run(&window)
        .await
}
