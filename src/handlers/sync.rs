use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::mood_entry::{EntryQuery, MoodEntry};
use crate::models::stats::{DataSourceInfo, PublishReport, SnapshotMetadata, SourcedStats};
use crate::models::sync_entry::{EntryRecord, SyncEntry};
use crate::services::reconciliation::SyncOutcome;
use crate::AppState;

use super::entries::Selection;

pub async fn force_sync(State(state): State<AppState>) -> AppResult<Json<SyncOutcome>> {
    Ok(Json(state.service.force_sync().await?))
}

pub async fn publish(State(state): State<AppState>) -> AppResult<Json<PublishReport>> {
    Ok(Json(state.service.publish().await?))
}

pub async fn status(State(state): State<AppState>) -> Json<DataSourceInfo> {
    Json(state.service.get_data_source_info().await)
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.service.clear_caches().await;
    Json(json!({ "cleared": true }))
}

pub async fn list_sync_entries(State(state): State<AppState>) -> Json<Vec<SyncEntry>> {
    Json(state.service.sync_entries().await)
}

pub async fn ingest_sync_entries(
    State(state): State<AppState>,
    Json(records): Json<Vec<EntryRecord>>,
) -> AppResult<Json<Value>> {
    let ids = state.service.ingest_records(records).await?;
    Ok(Json(json!({ "saved": ids.len(), "ids": ids })))
}

// Remote snapshot, read directly without touching the local store.

pub async fn remote_metadata(State(state): State<AppState>) -> Json<SnapshotMetadata> {
    Json(state.service.remote().get_metadata().await)
}

pub async fn remote_stats(State(state): State<AppState>) -> Json<SourcedStats> {
    Json(state.service.remote().get_stats().await)
}

pub async fn remote_entries(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    let remote = state.service.remote();
    let entries = match Selection::try_from(query)? {
        Selection::All => remote.get_entries().await,
        Selection::Month(year, month) => remote.get_entries_for_month(year, month).await,
        Selection::Range(start, end) => remote.get_entries_in_range(start, end).await,
        Selection::Search(term) => remote.search_entries(&term).await,
    };
    Ok(Json(entries))
}

pub async fn remote_entry(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<MoodEntry>> {
    state
        .service
        .remote()
        .get_entry_by_date(date)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No remote entry for {}", date)))
}
