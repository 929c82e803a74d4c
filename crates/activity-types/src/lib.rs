//! Shared data types for activity ingestion and storage.
//!
//! Collectors produce [`CollectedActivity`] values that still carry the
//! source-native author. Only identity resolution turns one into an
//! [`Activity`], so a stored record can never hold a source-native author id.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a persisted activity tag is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown activity type '{0}'")]
pub struct ParseActivityKindError(pub String);

/// Provenance/category tag stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    #[serde(rename = "common")]
    Common,
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "GitHub")]
    GitHub,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Join => "join",
            Self::GitHub => "GitHub",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ParseActivityKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "common" => Ok(Self::Common),
            "join" => Ok(Self::Join),
            "GitHub" => Ok(Self::GitHub),
            other => Err(ParseActivityKindError(other.to_string())),
        }
    }
}

/// Identity namespace a source-native author id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityNamespace {
    Discord,
    Github,
}

impl IdentityNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Github => "github",
        }
    }
}

/// The external feed an activity was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    DiscordMessages,
    DiscordJoins,
    GithubCommits,
}

impl ActivitySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DiscordMessages => "discord_messages",
            Self::DiscordJoins => "discord_joins",
            Self::GithubCommits => "github_commits",
        }
    }

    /// Namespace used to resolve this source's author ids.
    pub fn identity_namespace(self) -> IdentityNamespace {
        match self {
            Self::DiscordMessages | Self::DiscordJoins => IdentityNamespace::Discord,
            Self::GithubCommits => IdentityNamespace::Github,
        }
    }
}

impl fmt::Display for ActivitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the globally unique `<prefix>-<native id>` activity key.
pub fn namespaced_activity_id(prefix: &str, native_id: &str) -> String {
    format!("{prefix}-{native_id}")
}

/// Normalized activity record, keyed by `id` for idempotent upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub body: String,
    pub is_special: bool,
}

/// Activity produced by a collector, before identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedActivity {
    pub source: ActivitySource,
    pub id: String,
    pub native_author_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub body: String,
    pub is_special: bool,
}

impl CollectedActivity {
    /// Chat message content event.
    pub fn message(
        native_id: &str,
        native_author_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            source: ActivitySource::DiscordMessages,
            id: namespaced_activity_id("discord", native_id),
            native_author_id: native_author_id.into(),
            timestamp,
            kind: ActivityKind::Common,
            body: body.into(),
            is_special: false,
        }
    }

    /// Guild membership event. The member id doubles as the native event id.
    pub fn join(native_member_id: &str, joined_at: DateTime<Utc>) -> Self {
        Self {
            source: ActivitySource::DiscordJoins,
            id: namespaced_activity_id("join", native_member_id),
            native_author_id: native_member_id.to_string(),
            timestamp: joined_at,
            kind: ActivityKind::Join,
            body: String::new(),
            is_special: true,
        }
    }

    /// Commit event namespaced by the repository it was read from.
    pub fn commit(
        repo_prefix: &str,
        sha: &str,
        author_login: impl Into<String>,
        committed_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: ActivitySource::GithubCommits,
            id: namespaced_activity_id(repo_prefix, sha),
            native_author_id: author_login.into(),
            timestamp: committed_at,
            kind: ActivityKind::GitHub,
            body: message.into(),
            is_special: false,
        }
    }

    pub fn identity_namespace(&self) -> IdentityNamespace {
        self.source.identity_namespace()
    }

    /// Consumes the collected record into its final form under `canonical_user_id`.
    pub fn resolve(self, canonical_user_id: impl Into<String>) -> Activity {
        Activity {
            id: self.id,
            user_id: canonical_user_id.into(),
            timestamp: self.timestamp,
            kind: self.kind,
            body: self.body,
            is_special: self.is_special,
        }
    }
}
