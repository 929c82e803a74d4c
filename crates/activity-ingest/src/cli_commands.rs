use std::collections::BTreeMap;
use std::time::Duration;

use activity_store::{ActivityStore, InMemoryActivityStore, SqliteActivityStore};
use anyhow::{Context, Result};
use chrono::{Months, Utc};
use serde_json::json;

use crate::cli_args::{Command, RunArgs, SummaryArgs};
use crate::collection_window::parse_timezone;
use crate::config::{DiscordConfig, GithubConfig, IngestConfig};
use crate::github_api_client::RepoRef;
use crate::identity::DirectorySource;
use crate::orchestrator::run_ingestion;
use crate::retry::ThrottlePolicy;
use crate::run_report::{write_run_report, RunReport};

pub async fn execute_command(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => execute_run(&args).await.map(|_| ()),
        Command::Summary(args) => {
            let rendered = execute_summary(&args).await?;
            println!("{rendered}");
            Ok(())
        }
    }
}

pub fn ingest_config_from_args(args: &RunArgs) -> Result<IngestConfig> {
    let repo = RepoRef::new(&args.github_owner, &args.github_repo)?;
    let config = IngestConfig {
        discord: DiscordConfig {
            api_base: args.discord_api_base.clone(),
            bot_token: args.discord_bot_token.clone(),
            channel_id: args.discord_channel_id.clone(),
            guild_id: args.discord_guild_id.clone(),
            filter_joins_by_window: args.filter_joins_by_window,
        },
        github: GithubConfig {
            api_base: args.github_api_base.clone(),
            token: args
                .github_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            repo,
        },
        members_source: DirectorySource::parse(&args.members_source),
        timezone: parse_timezone(&args.timezone)?,
        page_size: args.page_size,
        request_timeout: Duration::from_millis(args.request_timeout_ms),
        directory_timeout: Duration::from_millis(args.directory_timeout_ms),
        run_deadline: Duration::from_secs(args.run_deadline_secs),
        throttle: ThrottlePolicy::with_max_retries(args.max_throttle_retries),
        dry_run: args.dry_run,
        report_path: args.report_path.clone(),
    };
    config.validate()?;
    Ok(config)
}

pub async fn execute_run(args: &RunArgs) -> Result<RunReport> {
    let config = ingest_config_from_args(args)?;
    // Dry runs never touch the database file.
    let store: Box<dyn ActivityStore> = if config.dry_run {
        Box::new(InMemoryActivityStore::new())
    } else {
        Box::new(
            SqliteActivityStore::new(&args.database)
                .with_context(|| format!("failed to open {}", args.database.display()))?,
        )
    };
    let report = run_ingestion(&config, store.as_ref(), Utc::now())
        .await
        .context("ingestion run failed")?;

    report.log_summary();
    if let Some(path) = config.report_path.as_deref() {
        write_run_report(path, &report)?;
        tracing::info!(path = %path.display(), "wrote run report");
    }
    Ok(report)
}

/// Renders the requested projection as pretty JSON.
pub async fn execute_summary(args: &SummaryArgs) -> Result<String> {
    let store = SqliteActivityStore::new(&args.database)
        .with_context(|| format!("failed to open {}", args.database.display()))?;
    let user = args.user.trim();

    let value = if let Some(date) = args.date {
        let activities = store.activities_on(user, date).await?;
        json!({
            "user_id": user,
            "date": date.to_string(),
            "activities": activities,
        })
    } else if args.total {
        let total = store.total_for_user(user).await?;
        json!({
            "user_id": user,
            "total": total,
        })
    } else {
        let until = args.until.unwrap_or_else(|| Utc::now().date_naive());
        let since = match args.since {
            Some(since) => since,
            None => until
                .checked_sub_months(Months::new(12))
                .context("default summary start is out of range")?,
        };
        let days: BTreeMap<String, u64> = store
            .daily_counts(user, since, until)
            .await?
            .into_iter()
            .map(|(day, count)| (day.to_string(), count))
            .collect();
        json!({
            "user_id": user,
            "since": since.to_string(),
            "until": until.to_string(),
            "days": days,
        })
    };
    serde_json::to_string_pretty(&value).context("failed to render summary")
}

#[cfg(test)]
mod tests {
    use super::{execute_summary, ingest_config_from_args};
    use crate::cli_args::{Cli, Command, SummaryArgs};
    use activity_store::{ActivityStore, SqliteActivityStore};
    use activity_types::CollectedActivity;
    use chrono::{NaiveDate, TimeZone, Utc};
    use clap::Parser;
    use tempfile::tempdir;

    #[test]
    fn functional_run_args_become_validated_config() {
        let cli = Cli::try_parse_from([
            "activity-ingest",
            "run",
            "--discord-bot-token",
            "token",
            "--github-token",
            "  ",
            "--members-source",
            "./members.json",
            "--max-throttle-retries",
            "5",
        ])
        .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = ingest_config_from_args(&args).expect("config");
        assert_eq!(config.github.token, None);
        assert_eq!(config.throttle.max_retries, Some(5));
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn regression_unknown_timezone_is_rejected() {
        let cli = Cli::try_parse_from([
            "activity-ingest",
            "run",
            "--discord-bot-token",
            "token",
            "--timezone",
            "Mars/Olympus",
        ])
        .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(ingest_config_from_args(&args).is_err());
    }

    #[tokio::test]
    async fn integration_summary_reports_daily_counts_and_day_listing() {
        let temp = tempdir().expect("tempdir");
        let database = temp.path().join("activity.sqlite");
        let store = SqliteActivityStore::new(&database).expect("store");
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let batch = vec![
            CollectedActivity::message("1", "111", at, "hello").resolve("alice-gh"),
            CollectedActivity::message("2", "111", at, "again").resolve("alice-gh"),
        ];
        assert_eq!(store.upsert_batch(&batch).await.written, 2);

        let counts = execute_summary(&SummaryArgs {
            database: database.clone(),
            user: "alice-gh".to_string(),
            since: NaiveDate::from_ymd_opt(2025, 5, 30),
            until: NaiveDate::from_ymd_opt(2025, 6, 2),
            date: None,
            total: false,
        })
        .await
        .expect("summary");
        let counts: serde_json::Value = serde_json::from_str(&counts).expect("json");
        assert_eq!(counts["days"]["2025-06-01"], 2);

        let listing = execute_summary(&SummaryArgs {
            database,
            user: "alice-gh".to_string(),
            since: None,
            until: None,
            date: NaiveDate::from_ymd_opt(2025, 6, 1),
            total: false,
        })
        .await
        .expect("listing");
        let listing: serde_json::Value = serde_json::from_str(&listing).expect("json");
        assert_eq!(listing["activities"][0]["id"], "discord-1");
        assert_eq!(listing["activities"][0]["type"], "common");
    }
}
