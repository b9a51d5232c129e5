//! Single data API over the local store and the remote snapshot.
//!
//! Reads prefer the local store and fall back to a cached copy of the remote
//! entry list, importing it locally when it has data. Writes only ever touch
//! the local store. A throttled background sync runs off local read hits and
//! adopts the remote list wholesale when it holds more entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use validator::Validate;

use crate::error::AppResult;
use crate::models::mood_entry::{MoodEntry, MoodEntryPatch, NewMoodEntry};
use crate::models::stats::{DataSource, DataSourceInfo, PublishReport, SourcedStats};
use crate::models::sync_entry::{EntryRecord, SyncEntry};
use crate::services::backup::{parse_backup, render_backup};
use crate::services::local_store::LocalStore;
use crate::services::query::{
    select_all, select_date, select_matching, select_month, select_range,
};
use crate::services::remote::{RemoteSnapshotStore, DEFAULT_CACHE_VERSION};
use crate::services::stats::{snapshot_stats, summarize};

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub cache_expiry: Duration,
    pub sync_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            cache_expiry: Duration::from_secs(600),
            sync_interval: Duration::from_secs(300),
        }
    }
}

struct CachedEntries {
    entries: Vec<MoodEntry>,
    fetched_at: Instant,
}

/// Throttle and cache state. Lost on restart; staleness is tolerated.
#[derive(Default)]
struct SyncState {
    cached: Option<CachedEntries>,
    last_sync: Option<Instant>,
    last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub local_count: usize,
    pub remote_count: usize,
    pub imported_remote: bool,
}

#[derive(Clone)]
pub struct ReconciliationService {
    local: LocalStore,
    remote: RemoteSnapshotStore,
    state: Arc<Mutex<SyncState>>,
    settings: SyncSettings,
}

impl ReconciliationService {
    pub fn new(local: LocalStore, remote: RemoteSnapshotStore, settings: SyncSettings) -> Self {
        Self {
            local,
            remote,
            state: Arc::new(Mutex::new(SyncState::default())),
            settings,
        }
    }

    /// Direct, uncached access to the remote snapshot.
    pub fn remote(&self) -> &RemoteSnapshotStore {
        &self.remote
    }

    // ------------------------------------------------------------------
    // Remote list cache
    // ------------------------------------------------------------------

    /// Fresh cached list, or a new fetch that replaces the cache. Fetch
    /// failures are returned without touching the cache.
    async fn fetch_remote_cached(&self) -> AppResult<Vec<MoodEntry>> {
        {
            let state = self.state.lock().await;
            if let Some(cached) = &state.cached {
                if cached.fetched_at.elapsed() < self.settings.cache_expiry {
                    return Ok(cached.entries.clone());
                }
            }
        }

        let entries = self.remote.fetch_entries().await?;

        let mut state = self.state.lock().await;
        state.cached = Some(CachedEntries {
            entries: entries.clone(),
            fetched_at: Instant::now(),
        });
        Ok(entries)
    }

    /// Like `fetch_remote_cached`, but serves the stale list (or nothing) when
    /// the fetch fails.
    pub async fn cached_remote_entries(&self) -> Vec<MoodEntry> {
        match self.fetch_remote_cached().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Remote fetch failed, serving cached entries");
                let state = self.state.lock().await;
                state
                    .cached
                    .as_ref()
                    .map(|c| c.entries.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Imports the remote list into the empty local store. Best effort.
    async fn adopt_remote(&self, remote: &[MoodEntry]) {
        if remote.is_empty() {
            return;
        }
        match self.local.import_all(remote).await {
            Ok(()) => tracing::info!(count = remote.len(), "Imported remote entries into local store"),
            Err(e) => tracing::warn!(error = %e, "Failed to import remote entries locally"),
        }
    }

    /// Remote half of the read path: select from the cached list and, on a
    /// hit, adopt the full list locally.
    async fn read_remote<T>(
        &self,
        select: impl FnOnce(&[MoodEntry]) -> T,
        is_hit: impl FnOnce(&T) -> bool,
    ) -> T {
        let remote = self.cached_remote_entries().await;
        let result = select(&remote);
        if is_hit(&result) {
            self.adopt_remote(&remote).await;
        }
        result
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    pub async fn get_all(&self) -> Vec<MoodEntry> {
        match self.local.get_all().await {
            Ok(entries) if !entries.is_empty() => {
                self.trigger_background_sync().await;
                return entries;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Local read failed, falling back to remote"),
        }

        self.read_remote(select_all, |r| !r.is_empty())
            .await
    }

    pub async fn get_by_date(&self, date: NaiveDate) -> Option<MoodEntry> {
        match self.local.get_by_date(date).await {
            Ok(Some(entry)) => return Some(entry),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, %date, "Local read failed, falling back to remote"),
        }

        self.read_remote(|remote| select_date(remote, date), Option::is_some)
            .await
    }

    pub async fn get_for_month(&self, year: i32, month: u32) -> Vec<MoodEntry> {
        match self.local.get_for_month(year, month).await {
            Ok(entries) if !entries.is_empty() => return entries,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, year, month, "Local read failed, falling back to remote"),
        }

        self.read_remote(|remote| select_month(remote, year, month), |r| !r.is_empty())
            .await
    }

    pub async fn get_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<MoodEntry> {
        match self.local.get_in_range(start, end).await {
            Ok(entries) if !entries.is_empty() => return entries,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, %start, %end, "Local read failed, falling back to remote"),
        }

        self.read_remote(|remote| select_range(remote, start, end), |r| !r.is_empty())
            .await
    }

    pub async fn search(&self, term: &str) -> Vec<MoodEntry> {
        match self.local.search(term).await {
            Ok(entries) if !entries.is_empty() => return entries,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Local search failed, falling back to remote"),
        }

        self.read_remote(|remote| select_matching(remote, term), |r| !r.is_empty())
            .await
    }

    pub async fn get_stats(&self) -> SourcedStats {
        match self.local.get_stats().await {
            Ok(stats) if stats.total_entries > 0 => {
                return SourcedStats {
                    stats,
                    data_source: DataSource::Local,
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Local stats failed, falling back to remote"),
        }

        let stats = self
            .read_remote(summarize, |s| s.total_entries > 0)
            .await;
        let data_source = if stats.total_entries > 0 {
            DataSource::Blob
        } else {
            DataSource::Local
        };
        SourcedStats { stats, data_source }
    }

    // ------------------------------------------------------------------
    // Write path: local only, errors propagate
    // ------------------------------------------------------------------

    pub async fn save(&self, entry: NewMoodEntry) -> AppResult<i64> {
        self.local.save(entry).await
    }

    pub async fn update(&self, id: i64, patch: MoodEntryPatch) -> AppResult<i64> {
        self.local.update(id, patch).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.local.delete(id).await
    }

    pub async fn clear_all(&self) -> AppResult<()> {
        self.local.clear_all().await
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Schedules a background sync unless one ran within the sync interval.
    /// The marker is set before the task is spawned so concurrent reads do
    /// not schedule duplicates.
    async fn trigger_background_sync(&self) {
        {
            let mut state = self.state.lock().await;
            if let Some(last) = state.last_sync {
                if last.elapsed() < self.settings.sync_interval {
                    return;
                }
            }
            state.last_sync = Some(Instant::now());
            state.last_sync_at = Some(Utc::now());
        }

        let service = self.clone();
        tokio::spawn(async move {
            match service.run_sync(false).await {
                Ok(outcome) => tracing::debug!(?outcome, "Background sync finished"),
                Err(e) => tracing::warn!(error = %e, "Background sync failed"),
            }
        });
    }

    /// Compares local and remote counts and adopts the remote list when it
    /// is strictly longer. `strict` propagates remote fetch failures instead
    /// of degrading to the cached list.
    async fn run_sync(&self, strict: bool) -> AppResult<SyncOutcome> {
        let remote_read = async {
            if strict {
                self.fetch_remote_cached().await
            } else {
                Ok(self.cached_remote_entries().await)
            }
        };
        let (local, remote) = tokio::join!(self.local.get_all(), remote_read);
        let (local, remote) = (local?, remote?);

        let imported_remote = remote.len() > local.len();
        if imported_remote {
            self.local.import_all(&remote).await?;
            tracing::info!(
                local = local.len(),
                remote = remote.len(),
                "Remote snapshot has more entries, replaced local store"
            );
        }

        Ok(SyncOutcome {
            local_count: local.len(),
            remote_count: remote.len(),
            imported_remote,
        })
    }

    /// Drops the throttle and cache, then syncs immediately. Errors propagate.
    pub async fn force_sync(&self) -> AppResult<SyncOutcome> {
        {
            let mut state = self.state.lock().await;
            state.cached = None;
            state.last_sync = Some(Instant::now());
            state.last_sync_at = Some(Utc::now());
        }
        self.run_sync(true).await
    }

    /// Pushes the full local list to the remote snapshot and refreshes its
    /// metadata. Errors propagate.
    pub async fn publish(&self) -> AppResult<PublishReport> {
        self.remote.ensure_publish_configured()?;

        let entries = self.local.export_all().await?;
        let entries_url = self.remote.publish_entries(&entries).await?;
        let stats = snapshot_stats(&entries);
        let last_updated = self
            .remote
            .publish_metadata(&entries_url, &stats, DEFAULT_CACHE_VERSION)
            .await?;

        let mut state = self.state.lock().await;
        state.cached = Some(CachedEntries {
            entries,
            fetched_at: Instant::now(),
        });

        Ok(PublishReport {
            entries_url,
            total_entries: stats.total_entries,
            last_updated,
        })
    }

    pub async fn get_data_source_info(&self) -> DataSourceInfo {
        let (local_count, remote_entries, remote_probe) = tokio::join!(
            self.local.count(),
            self.cached_remote_entries(),
            self.remote.has_data()
        );
        let local_count = local_count
            .map_err(|e| tracing::warn!(error = %e, "Failed to count local entries"))
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let last_sync = self.state.lock().await.last_sync_at;

        DataSourceInfo {
            has_local_data: local_count > 0,
            has_remote_data: remote_probe || !remote_entries.is_empty(),
            local_count,
            remote_count: remote_entries.len(),
            last_sync,
        }
    }

    pub async fn clear_caches(&self) {
        *self.state.lock().await = SyncState::default();
    }

    // ------------------------------------------------------------------
    // Backup and sync-API shapes
    // ------------------------------------------------------------------

    pub async fn export_backup(&self) -> AppResult<String> {
        render_backup(&self.local.export_all().await?)
    }

    /// Validates the whole file before replacing the local store.
    pub async fn import_backup(&self, raw: &str) -> AppResult<usize> {
        let entries = parse_backup(raw)?;
        self.local.import_all(&entries).await?;
        Ok(entries.len())
    }

    pub async fn sync_entries(&self) -> Vec<SyncEntry> {
        self.get_all().await.iter().map(SyncEntry::from).collect()
    }

    /// Upserts records of either shape by date in one transaction. All
    /// records are validated before the first write.
    pub async fn ingest_records(&self, records: Vec<EntryRecord>) -> AppResult<Vec<i64>> {
        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            let entry = record.to_new_entry();
            entry.validate().map_err(|e| {
                tracing::debug!(date = %record.date(), mood = record.mood(), "Rejected sync record");
                e
            })?;
            entries.push(entry);
        }

        self.local.save_all(&entries).await
    }
}
