//! Membership directory loading and source-native author resolution.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use activity_types::IdentityNamespace;
use serde::{Deserialize, Deserializer};

use crate::error::{IngestError, IngestResult};
use crate::http_transport::USER_AGENT_VALUE;

pub const DEFAULT_MEMBERS_SOURCE: &str = "https://anthrotech.dev/members.json";

/// One member as published in the directory.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    #[serde(default)]
    pub name: String,
    /// GitHub login, also the canonical member id.
    #[serde(default, alias = "github_login")]
    pub github: String,
    #[serde(
        default,
        alias = "discord_numeric_id",
        deserialize_with = "deserialize_discord_id"
    )]
    pub discord: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDiscordId {
    Number(u64),
    Text(String),
}

fn deserialize_discord_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawDiscordId>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawDiscordId::Number(0)) | None => None,
        Some(RawDiscordId::Number(value)) => Some(value.to_string()),
        Some(RawDiscordId::Text(value)) => {
            let value = value.trim();
            (!value.is_empty() && value != "0").then(|| value.to_string())
        }
    })
}

/// Directory keyed by member name. Read-only for the length of a run.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MembershipDirectory {
    entries: BTreeMap<String, DirectoryEntry>,
}

impl MembershipDirectory {
    pub fn from_json_str(raw: &str) -> IngestResult<Self> {
        serde_json::from_str(raw)
            .map_err(|error| IngestError::Directory(format!("invalid directory json: {error}")))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, DirectoryEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &DirectoryEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }
}

/// Exact-match lookup from `(namespace, native id)` to canonical member id.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    discord: HashMap<String, String>,
    github: HashMap<String, String>,
}

impl IdentityResolver {
    pub fn new(directory: &MembershipDirectory) -> Self {
        let mut resolver = Self::default();
        for (member, entry) in directory.entries() {
            let canonical = entry.github.trim();
            if canonical.is_empty() {
                continue;
            }
            resolver
                .github
                .entry(canonical.to_string())
                .or_insert_with(|| canonical.to_string());
            if let Some(discord_id) = entry.discord.as_deref() {
                if let Some(existing) = resolver.discord.get(discord_id) {
                    tracing::warn!(
                        member,
                        discord_id,
                        kept = %existing,
                        "duplicate discord id in directory, keeping first entry"
                    );
                    continue;
                }
                resolver
                    .discord
                    .insert(discord_id.to_string(), canonical.to_string());
            }
        }
        resolver
    }

    /// Canonical member id, or `None` when the author is not a member.
    pub fn resolve(&self, namespace: IdentityNamespace, native_id: &str) -> Option<&str> {
        let table = match namespace {
            IdentityNamespace::Discord => &self.discord,
            IdentityNamespace::Github => &self.github,
        };
        table.get(native_id).map(String::as_str)
    }
}

/// Where the directory is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorySource {
    Url(String),
    File(PathBuf),
}

impl DirectorySource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

/// Fetches and parses the directory. Any failure is fatal for the run.
pub async fn load_membership_directory(
    source: &DirectorySource,
    timeout: Duration,
) -> IngestResult<MembershipDirectory> {
    let raw = match source {
        DirectorySource::File(path) => tokio::fs::read_to_string(path).await.map_err(|error| {
            IngestError::Directory(format!("failed to read {}: {error}", path.display()))
        })?,
        DirectorySource::Url(url) => {
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT_VALUE)
                .timeout(timeout)
                .build()
                .map_err(|error| IngestError::Directory(error.to_string()))?;
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|error| IngestError::Directory(format!("GET {url} failed: {error}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(IngestError::Directory(format!(
                    "GET {url} returned status {}",
                    status.as_u16()
                )));
            }
            response.text().await.map_err(|error| {
                IngestError::Directory(format!("failed to read {url} body: {error}"))
            })?
        }
    };
    let directory = MembershipDirectory::from_json_str(&raw)?;
    tracing::info!(members = directory.len(), "loaded membership directory");
    Ok(directory)
}
