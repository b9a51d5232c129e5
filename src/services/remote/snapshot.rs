use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::config::RemoteConfig;
use crate::error::{AppError, AppResult};
use crate::models::mood_entry::MoodEntry;
use crate::models::stats::{DataSource, EntryStats, SnapshotMetadata, SnapshotStats, SourcedStats};
use crate::services::query::{select_date, select_matching, select_month, select_range};
use crate::services::stats::{round2, summarize};

use super::blob::BlobClient;
use super::edge_config::EdgeConfigClient;
use super::retry::RetryPolicy;

pub const ENTRIES_URL_KEY: &str = "moodEntriesUrl";
pub const STATS_KEY: &str = "moodStats";
pub const CACHE_VERSION_KEY: &str = "cacheVersion";
pub const LAST_UPDATED_KEY: &str = "lastUpdated";

pub const DEFAULT_CACHE_VERSION: &str = "1.0.0";

/// Fixed so that every publish overwrites the same object.
pub const ENTRIES_PATHNAME: &str = "mood-data/entries.json";

/// Read-mostly remote copy of the journal: metadata in Edge Config, the full
/// entry list as a JSON blob. Reads never fail; they log and degrade.
#[derive(Clone)]
pub struct RemoteSnapshotStore {
    edge: EdgeConfigClient,
    blob: BlobClient,
    retry: RetryPolicy,
    config: RemoteConfig,
}

fn metadata_from_items(items: &Map<String, Value>) -> SnapshotMetadata {
    let stats = items
        .get(STATS_KEY)
        .and_then(|v| serde_json::from_value::<SnapshotStats>(v.clone()).ok())
        .unwrap_or_default();
    let cache_version = items
        .get(CACHE_VERSION_KEY)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CACHE_VERSION)
        .to_string();
    let last_updated = items
        .get(LAST_UPDATED_KEY)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let entries_url = items
        .get(ENTRIES_URL_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    SnapshotMetadata {
        stats,
        cache_version,
        last_updated,
        entries_url,
    }
}

/// Remote ids are generated elsewhere and may be strings. They are never
/// kept on import, so a non-integer id is dropped rather than failing the entry.
fn parse_remote_entry(value: &Value) -> Option<MoodEntry> {
    let mut object = value.as_object()?.clone();
    if object.get("id").is_some_and(|id| id.as_i64().is_none()) {
        object.remove("id");
    }
    serde_json::from_value(Value::Object(object)).ok()
}

/// Keeps entries that parse and pass the same shape checks the local store
/// enforces.
pub fn validate_entries(raw: &[Value]) -> Vec<MoodEntry> {
    let valid: Vec<MoodEntry> = raw
        .iter()
        .filter_map(parse_remote_entry)
        .filter(MoodEntry::is_valid)
        .collect();

    let dropped = raw.len() - valid.len();
    if dropped > 0 {
        tracing::warn!(dropped, "Dropped invalid remote entries");
    }
    valid
}

impl RemoteSnapshotStore {
    pub fn new(config: RemoteConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_delay());

        Ok(Self {
            edge: EdgeConfigClient::new(http.clone(), config.clone()),
            blob: BlobClient::new(http, config.clone()),
            retry,
            config,
        })
    }

    /// Both publish steps need credentials; check them before either runs.
    pub fn ensure_publish_configured(&self) -> AppResult<()> {
        self.config.blob_credentials()?;
        self.config.write_credentials()?;
        Ok(())
    }

    async fn try_metadata(&self) -> AppResult<SnapshotMetadata> {
        let items = self.edge.get_all_items().await?;
        Ok(metadata_from_items(&items))
    }

    pub async fn get_metadata(&self) -> SnapshotMetadata {
        match self.try_metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot metadata, using defaults");
                metadata_from_items(&Map::new())
            }
        }
    }

    /// Raw list behind the snapshot pointer. An empty pointer yields an empty
    /// list; transport and shape failures are returned to the caller.
    pub async fn fetch_raw_entries(&self) -> AppResult<Vec<Value>> {
        let metadata = self.try_metadata().await?;
        if metadata.entries_url.is_empty() {
            return Ok(Vec::new());
        }

        let url = metadata.entries_url;
        let body = self
            .retry
            .run("fetch snapshot entries", || self.blob.fetch_json(&url))
            .await?;

        match body {
            Value::Array(items) => Ok(items),
            other => Err(AppError::Remote(format!(
                "Snapshot entries are not a list (got {})",
                json_kind(&other)
            ))),
        }
    }

    pub async fn fetch_entries(&self) -> AppResult<Vec<MoodEntry>> {
        let raw = self.fetch_raw_entries().await?;
        Ok(validate_entries(&raw))
    }

    pub async fn get_raw_entries(&self) -> Vec<Value> {
        self.fetch_raw_entries().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to fetch snapshot entries");
            Vec::new()
        })
    }

    pub async fn get_entries(&self) -> Vec<MoodEntry> {
        validate_entries(&self.get_raw_entries().await)
    }

    pub async fn get_entries_for_month(&self, year: i32, month: u32) -> Vec<MoodEntry> {
        select_month(&self.get_entries().await, year, month)
    }

    pub async fn get_entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<MoodEntry> {
        select_range(&self.get_entries().await, start, end)
    }

    pub async fn search_entries(&self, term: &str) -> Vec<MoodEntry> {
        select_matching(&self.get_entries().await, term)
    }

    pub async fn get_entry_by_date(&self, date: NaiveDate) -> Option<MoodEntry> {
        select_date(&self.get_entries().await, date)
    }

    /// Prefers the stats pushed alongside the pointer; falls back to
    /// computing over the entry list.
    pub async fn get_stats(&self) -> SourcedStats {
        let metadata = match self.try_metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read remote stats");
                return SourcedStats {
                    stats: EntryStats::default(),
                    data_source: DataSource::EdgeConfigError,
                };
            }
        };

        if metadata.stats.total_entries > 0 {
            return SourcedStats {
                stats: EntryStats {
                    total_entries: metadata.stats.total_entries,
                    average_mood: round2(metadata.stats.average_mood),
                    average_dose: 0.0,
                    average_secondary_dose: 0.0,
                },
                data_source: DataSource::EdgeConfig,
            };
        }

        match self.fetch_entries().await {
            Ok(entries) => SourcedStats {
                stats: summarize(&entries),
                data_source: DataSource::Blob,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compute remote stats");
                SourcedStats {
                    stats: EntryStats::default(),
                    data_source: DataSource::EdgeConfigError,
                }
            }
        }
    }

    pub async fn has_data(&self) -> bool {
        match self.edge.has_item(ENTRIES_URL_KEY).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!(error = %e, "Remote existence probe failed");
                false
            }
        }
    }

    /// Uploads the full list as pretty-printed JSON. Not retried; failures
    /// propagate.
    pub async fn publish_entries(&self, entries: &[MoodEntry]) -> AppResult<String> {
        let body = serde_json::to_string_pretty(entries)?;
        let url = self
            .blob
            .put(ENTRIES_PATHNAME, body, "application/json")
            .await?;
        tracing::info!(count = entries.len(), url = %url, "Published snapshot entries");
        Ok(url)
    }

    /// Upserts pointer, stats, version and timestamp in one batched request.
    pub async fn publish_metadata(
        &self,
        entries_url: &str,
        stats: &SnapshotStats,
        cache_version: &str,
    ) -> AppResult<DateTime<Utc>> {
        let now = Utc::now();
        self.edge
            .upsert_items(vec![
                (ENTRIES_URL_KEY, json!(entries_url)),
                (STATS_KEY, serde_json::to_value(stats)?),
                (CACHE_VERSION_KEY, json!(cache_version)),
                (
                    LAST_UPDATED_KEY,
                    json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ),
            ])
            .await?;
        tracing::info!(entries_url, cache_version, "Published snapshot metadata");
        Ok(now)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
