use std::time::Duration;

use activity_ingest::{
    run_ingestion, CollectionWindow, DirectorySource, IngestConfig, IngestError, SnowflakeCodec,
    ThrottlePolicy,
};
use activity_store::{ActivityStore, InMemoryActivityStore, SqliteActivityStore};
use activity_types::ActivityKind;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

const CHANNEL_ID: &str = "1381317464805085204";
const GUILD_ID: &str = "1378710940807073913";
const MESSAGES_PATH: &str = "/channels/1381317464805085204/messages";
const MEMBERS_PATH: &str = "/guilds/1378710940807073913/members";
const COMMITS_PATH: &str = "/repos/anthrotech-dev/anthrotech-dev/commits";

/// 2025-06-03 08:00 in Tokyo; the window is 2025-06-01..=2025-06-02 JST.
fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap()
}

fn first_message_cursor() -> String {
    let window =
        CollectionWindow::trailing_days(run_time(), chrono_tz::Asia::Tokyo).expect("window");
    SnowflakeCodec::DISCORD.cursor_for_time(window.end + ChronoDuration::milliseconds(1))
}

fn config_for(server: &MockServer, page_size: usize) -> IngestConfig {
    let mut config = IngestConfig::with_discord_token("test-token").expect("config");
    config.discord.api_base = server.base_url();
    config.discord.channel_id = CHANNEL_ID.to_string();
    config.discord.guild_id = GUILD_ID.to_string();
    config.github.api_base = server.base_url();
    config.members_source = DirectorySource::Url(server.url("/members.json"));
    config.page_size = page_size;
    config.request_timeout = Duration::from_secs(5);
    config.throttle = ThrottlePolicy {
        max_retries: None,
        default_delay: Duration::from_millis(10),
    };
    config
}

fn mock_directory(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/members.json");
        then.status(200).json_body(json!({
            "alice": {"name": "Alice", "github_login": "alice-gh", "discord_numeric_id": 111}
        }));
    })
}

fn message(id: &str, author_id: &str, timestamp: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": 0,
        "content": content,
        "timestamp": timestamp,
        "author": {"id": author_id, "username": format!("user-{author_id}")}
    })
}

fn mock_empty_joins_and_commits(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path(MEMBERS_PATH);
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET).path(COMMITS_PATH);
        then.status(200).json_body(json!([]));
    });
}

/// Full happy-path fixture: one member message, two joins, two commits.
fn mock_all_sources(server: &MockServer) {
    mock_directory(server);
    server.mock(|when, then| {
        when.method(GET)
            .path(MESSAGES_PATH)
            .header("authorization", "Bot test-token")
            .query_param("limit", "2")
            .query_param("before", first_message_cursor());
        then.status(200).json_body(json!([message(
            "1378710940807073999",
            "111",
            "2025-06-01T12:00:00.000000+00:00",
            "hello"
        )]));
    });
    server.mock(|when, then| {
        when.method(GET).path(MEMBERS_PATH).query_param("after", "0");
        then.status(200).json_body(json!([
            {"user": {"id": "111", "username": "alice"}, "joined_at": "2024-01-01T00:00:00+00:00"},
            {"user": {"id": "999", "username": "stranger"}, "joined_at": "2025-06-01T00:00:00+00:00"}
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path(MEMBERS_PATH).query_param("after", "999");
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(COMMITS_PATH)
            .query_param("since", "2025-05-31T15:00:00.000Z")
            .query_param("until", "2025-06-02T14:59:59.999Z")
            .query_param("page", "1");
        then.status(200).json_body(json!([
            {
                "sha": "abc123",
                "commit": {"message": "fix build", "committer": {"date": "2025-06-01T10:00:00Z"}},
                "author": {"login": "alice-gh"}
            },
            {
                "sha": "def456",
                "commit": {"message": "unlinked", "committer": {"date": "2025-06-01T11:00:00Z"}},
                "author": null
            }
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path(COMMITS_PATH).query_param("page", "2");
        then.status(200).json_body(json!([]));
    });
}

#[tokio::test]
async fn integration_member_message_is_stored_under_github_login() {
    let server = MockServer::start();
    mock_all_sources(&server);
    let store = InMemoryActivityStore::new();

    let report = run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect("run");

    let stored = store
        .get("discord-1378710940807073999")
        .await
        .expect("get")
        .expect("message stored");
    assert_eq!(stored.user_id, "alice-gh");
    assert_eq!(stored.kind, ActivityKind::Common);
    assert_eq!(stored.body, "hello");
    assert!(!stored.is_special);
    assert_eq!(report.written, 3);
    assert!(report.failed_ids.is_empty());
}

#[tokio::test]
async fn integration_unlisted_join_is_dropped_and_member_join_kept() {
    let server = MockServer::start();
    mock_all_sources(&server);
    let store = InMemoryActivityStore::new();

    let report = run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect("run");

    assert!(store.get("join-999").await.expect("get").is_none());
    let join = store
        .get("join-111")
        .await
        .expect("get")
        .expect("member join stored even outside the window");
    assert_eq!(join.kind, ActivityKind::Join);
    assert!(join.is_special);

    let commit = store
        .get("anthrotech-dev-abc123")
        .await
        .expect("get")
        .expect("commit stored");
    assert_eq!(commit.kind, ActivityKind::GitHub);
    assert_eq!(commit.user_id, "alice-gh");

    let joins = report
        .sources
        .iter()
        .find(|source| source.source.as_str() == "discord_joins")
        .expect("join report");
    assert_eq!((joins.collected, joins.resolved, joins.dropped), (2, 1, 1));
    assert_eq!(store.count().await.expect("count"), 3);
}

#[tokio::test]
async fn integration_repeated_runs_produce_identical_sqlite_state() {
    let server = MockServer::start();
    mock_all_sources(&server);
    let temp = tempdir().expect("tempdir");
    let store = SqliteActivityStore::new(temp.path().join("activity.sqlite")).expect("store");
    let config = config_for(&server, 2);

    run_ingestion(&config, &store, run_time()).await.expect("first run");
    let first = store.get("join-111").await.expect("get");
    run_ingestion(&config, &store, run_time()).await.expect("second run");

    assert_eq!(store.count().await.expect("count"), 3);
    assert_eq!(store.get("join-111").await.expect("get"), first);
}

#[tokio::test]
async fn integration_throttled_page_is_retried_with_same_cursor() {
    let server = MockServer::start();
    mock_directory(&server);
    mock_empty_joins_and_commits(&server);
    let throttled = server.mock(|when, then| {
        when.method(GET)
            .path(MESSAGES_PATH)
            .query_param("before", first_message_cursor())
            .header("x-activity-retry-attempt", "0");
        then.status(429)
            .header("retry-after", "0.05")
            .body("rate limited");
    });
    let recovered = server.mock(|when, then| {
        when.method(GET)
            .path(MESSAGES_PATH)
            .query_param("before", first_message_cursor())
            .header("x-activity-retry-attempt", "1");
        then.status(200).json_body(json!([message(
            "1378710940807073999",
            "111",
            "2025-06-01T12:00:00+00:00",
            "after backoff"
        )]));
    });
    let store = InMemoryActivityStore::new();

    run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect("run");

    assert_eq!(throttled.calls(), 1);
    assert_eq!(recovered.calls(), 1);
    let stored = store
        .get("discord-1378710940807073999")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(stored.body, "after backoff");
}

#[tokio::test]
async fn integration_messages_stop_at_window_start() {
    let server = MockServer::start();
    mock_directory(&server);
    mock_empty_joins_and_commits(&server);
    let history = server.mock(|when, then| {
        when.method(GET).path(MESSAGES_PATH);
        then.status(200).json_body(json!([
            message("30", "111", "2025-06-02T14:59:59.999+00:00", "last moment"),
            {
                "id": "29",
                "type": 7,
                "content": "",
                "timestamp": "2025-06-02T10:00:00+00:00",
                "author": {"id": "111", "username": "alice"}
            },
            message("28", "111", "2025-05-31T14:59:59+00:00", "too early"),
            message("27", "111", "2025-06-01T00:00:00+00:00", "after boundary")
        ]));
    });
    let store = InMemoryActivityStore::new();

    let report = run_ingestion(&config_for(&server, 4), &store, run_time())
        .await
        .expect("run");

    assert_eq!(history.calls(), 1);
    assert!(store.get("discord-30").await.expect("get").is_some());
    assert!(store.get("discord-29").await.expect("get").is_none());
    assert!(store.get("discord-28").await.expect("get").is_none());
    assert!(store.get("discord-27").await.expect("get").is_none());
    assert_eq!(report.batch_size, 1);
}

#[tokio::test]
async fn integration_fatal_status_aborts_run_without_writes() {
    let server = MockServer::start();
    mock_directory(&server);
    server.mock(|when, then| {
        when.method(GET).path(MESSAGES_PATH);
        then.status(200).json_body(json!([message(
            "1378710940807073999",
            "111",
            "2025-06-01T12:00:00+00:00",
            "hello"
        )]));
    });
    server.mock(|when, then| {
        when.method(GET).path(MEMBERS_PATH);
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET).path(COMMITS_PATH);
        then.status(500).body("upstream exploded");
    });
    let store = InMemoryActivityStore::new();

    let error = run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect_err("fatal status");

    assert!(matches!(
        error,
        IngestError::UnexpectedStatus { status: 500, ref body, .. } if body.contains("upstream exploded")
    ));
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn integration_directory_failure_is_fatal_before_collection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/members.json");
        then.status(404).body("missing");
    });
    let messages = server.mock(|when, then| {
        when.method(GET).path(MESSAGES_PATH);
        then.status(200).json_body(json!([]));
    });
    let store = InMemoryActivityStore::new();

    let error = run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect_err("directory failure");

    assert!(matches!(error, IngestError::Directory(_)));
    assert_eq!(messages.calls(), 0);
}

#[tokio::test]
async fn functional_dry_run_collects_without_persisting() {
    let server = MockServer::start();
    mock_all_sources(&server);
    let store = InMemoryActivityStore::new();
    let mut config = config_for(&server, 2);
    config.dry_run = true;

    let report = run_ingestion(&config, &store, run_time())
        .await
        .expect("run");

    assert!(report.dry_run);
    assert_eq!(report.batch_size, 3);
    assert_eq!(report.written, 0);
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn functional_join_window_filter_is_opt_in() {
    let server = MockServer::start();
    mock_all_sources(&server);
    let store = InMemoryActivityStore::new();
    let mut config = config_for(&server, 2);
    config.discord.filter_joins_by_window = true;

    run_ingestion(&config, &store, run_time())
        .await
        .expect("run");

    assert!(store.get("join-111").await.expect("get").is_none());
    assert_eq!(store.count().await.expect("count"), 2);
}

#[tokio::test]
async fn regression_directory_can_be_read_from_a_file() {
    let server = MockServer::start();
    mock_empty_joins_and_commits(&server);
    server.mock(|when, then| {
        when.method(GET).path(MESSAGES_PATH);
        then.status(200).json_body(json!([message(
            "1378710940807073999",
            "111",
            "2025-06-01T12:00:00+00:00",
            "hello"
        )]));
    });
    let temp = tempdir().expect("tempdir");
    let members = temp.path().join("members.json");
    std::fs::write(
        &members,
        r#"{"alice": {"name": "Alice", "github": "alice-gh", "discord": "111"}}"#,
    )
    .expect("write members");
    let store = InMemoryActivityStore::new();
    let mut config = config_for(&server, 2);
    config.members_source = DirectorySource::File(members);

    run_ingestion(&config, &store, run_time())
        .await
        .expect("run");

    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn regression_commits_returned_for_the_window_are_not_refiltered() {
    let server = MockServer::start();
    mock_directory(&server);
    server.mock(|when, then| {
        when.method(GET).path(MESSAGES_PATH);
        then.status(200).json_body(json!([]));
    });
    server.mock(|when, then| {
        when.method(GET).path(MEMBERS_PATH);
        then.status(200).json_body(json!([]));
    });
    // Dated before the window, but the server matched it on since/until.
    server.mock(|when, then| {
        when.method(GET)
            .path(COMMITS_PATH)
            .query_param("since", "2025-05-31T15:00:00.000Z")
            .query_param("page", "1");
        then.status(200).json_body(json!([{
            "sha": "old001",
            "commit": {"message": "rebased", "committer": {"date": "2025-05-20T00:00:00Z"}},
            "author": {"login": "alice-gh"}
        }]));
    });
    let store = InMemoryActivityStore::new();

    run_ingestion(&config_for(&server, 2), &store, run_time())
        .await
        .expect("run");

    let commit = store
        .get("anthrotech-dev-old001")
        .await
        .expect("get")
        .expect("commit kept");
    assert_eq!(commit.user_id, "alice-gh");
    assert_eq!(commit.kind, ActivityKind::GitHub);
}
