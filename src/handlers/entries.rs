use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::mood_entry::{EntryQuery, MoodEntry, MoodEntryPatch, NewMoodEntry};
use crate::models::stats::SourcedStats;
use crate::services::query::month_bounds;
use crate::AppState;

/// Which read a list request maps to.
#[derive(Debug, PartialEq)]
pub enum Selection {
    All,
    Month(i32, u32),
    Range(NaiveDate, NaiveDate),
    Search(String),
}

impl TryFrom<EntryQuery> for Selection {
    type Error = AppError;

    fn try_from(query: EntryQuery) -> AppResult<Self> {
        match query {
            EntryQuery { q: Some(term), .. } => Ok(Selection::Search(term)),
            EntryQuery {
                year: Some(year),
                month: Some(month),
                ..
            } => {
                if month_bounds(year, month).is_none() {
                    return Err(AppError::Validation(format!(
                        "Invalid month {}-{}",
                        year, month
                    )));
                }
                Ok(Selection::Month(year, month))
            }
            EntryQuery {
                start: Some(start),
                end: Some(end),
                ..
            } => Ok(Selection::Range(start, end)),
            EntryQuery {
                year: None,
                month: None,
                start: None,
                end: None,
                q: None,
            } => Ok(Selection::All),
            _ => Err(AppError::Validation(
                "Use year and month together, or start and end together".into(),
            )),
        }
    }
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    let service = &state.service;
    let entries = match Selection::try_from(query)? {
        Selection::All => service.get_all().await,
        Selection::Month(year, month) => service.get_for_month(year, month).await,
        Selection::Range(start, end) => service.get_in_range(start, end).await,
        Selection::Search(term) => service.search(&term).await,
    };
    Ok(Json(entries))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<MoodEntry>> {
    state
        .service
        .get_by_date(date)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No entry for {}", date)))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Json(body): Json<NewMoodEntry>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = state.service.save(body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MoodEntryPatch>,
) -> AppResult<Json<Value>> {
    let id = state.service.update(id, body).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    state.service.delete(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn clear_entries(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.service.clear_all().await?;
    tracing::info!("Local journal cleared");
    Ok(Json(json!({ "cleared": true })))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<SourcedStats> {
    Json(state.service.get_stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &str) -> EntryQuery {
        serde_json::from_value(serde_json::from_str(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_selection_from_query() {
        assert_eq!(Selection::try_from(query("{}")).unwrap(), Selection::All);
        assert_eq!(
            Selection::try_from(query(r#"{"year": 2025, "month": 2}"#)).unwrap(),
            Selection::Month(2025, 2)
        );
        assert_eq!(
            Selection::try_from(query(r#"{"q": "tired", "year": 2025}"#)).unwrap(),
            Selection::Search("tired".into())
        );
        assert!(matches!(
            Selection::try_from(query(r#"{"start": "2025-01-01", "end": "2025-01-31"}"#)),
            Ok(Selection::Range(_, _))
        ));
    }

    #[test]
    fn test_incomplete_or_invalid_query_is_rejected() {
        assert!(Selection::try_from(query(r#"{"year": 2025}"#)).is_err());
        assert!(Selection::try_from(query(r#"{"end": "2025-01-31"}"#)).is_err());
        assert!(Selection::try_from(query(r#"{"year": 2025, "month": 13}"#)).is_err());
    }
}
