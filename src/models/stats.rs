use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate over a set of entries, as reported to the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStats {
    pub total_entries: i64,
    pub average_mood: f64,
    pub average_dose: f64,
    pub average_secondary_dose: f64,
}

/// Where a stats figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    Local,
    EdgeConfig,
    Blob,
    EdgeConfigError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedStats {
    #[serde(flatten)]
    pub stats: EntryStats,
    pub data_source: DataSource,
}

/// Summary pushed next to the snapshot pointer in the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    #[serde(default)]
    pub total_entries: i64,
    #[serde(default)]
    pub average_mood: f64,
    #[serde(default)]
    pub streak_days: i64,
    #[serde(default)]
    pub most_frequent_mood: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_entry_date: Option<NaiveDate>,
}

/// Metadata record read back from the key-value store, defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub stats: SnapshotStats,
    pub cache_version: String,
    pub last_updated: DateTime<Utc>,
    pub entries_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceInfo {
    pub has_local_data: bool,
    pub has_remote_data: bool,
    pub local_count: usize,
    pub remote_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub entries_url: String,
    pub total_entries: i64,
    pub last_updated: DateTime<Utc>,
}
