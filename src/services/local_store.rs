use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::mood_entry::{MoodEntry, MoodEntryPatch, NewMoodEntry};
use crate::models::stats::EntryStats;
use crate::services::query::{month_bounds, select_matching};
use crate::services::stats::round2;

/// Durable on-device collection of mood entries, one per date.
#[derive(Clone)]
pub struct LocalStore {
    db: SqlitePool,
}

impl LocalStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_all(&self) -> AppResult<Vec<MoodEntry>> {
        let entries = sqlx::query_as::<_, MoodEntry>(
            "SELECT * FROM mood_entries ORDER BY date ASC, id ASC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    pub async fn get_by_date(&self, date: NaiveDate) -> AppResult<Option<MoodEntry>> {
        let entry = sqlx::query_as::<_, MoodEntry>(
            "SELECT * FROM mood_entries WHERE date = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(date)
        .fetch_optional(&self.db)
        .await?;
        Ok(entry)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<MoodEntry>> {
        let entry = sqlx::query_as::<_, MoodEntry>("SELECT * FROM mood_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(entry)
    }

    pub async fn get_for_month(&self, year: i32, month: u32) -> AppResult<Vec<MoodEntry>> {
        let (start, end) = month_bounds(year, month)
            .ok_or_else(|| AppError::Validation(format!("Invalid month: {year}-{month}")))?;
        self.get_in_range(start, end).await
    }

    pub async fn get_in_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<MoodEntry>> {
        let entries = sqlx::query_as::<_, MoodEntry>(
            r#"
            SELECT * FROM mood_entries
            WHERE date BETWEEN $1 AND $2
            ORDER BY date ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    /// Case-insensitive substring match on the comment. Done in Rust because
    /// SQLite's LIKE only folds ASCII.
    pub async fn search(&self, term: &str) -> AppResult<Vec<MoodEntry>> {
        let entries = self.get_all().await?;
        Ok(select_matching(&entries, term))
    }

    /// Upsert by date: an existing entry for the day is updated in place.
    pub async fn save(&self, entry: NewMoodEntry) -> AppResult<i64> {
        entry.validate()?;
        let mut conn = self.db.acquire().await?;
        upsert_by_date(&mut conn, &entry).await
    }

    /// Upserts a batch in one transaction; nothing is written unless every
    /// entry validates and saves.
    pub async fn save_all(&self, entries: &[NewMoodEntry]) -> AppResult<Vec<i64>> {
        for entry in entries {
            entry.validate()?;
        }

        let mut tx = self.db.begin().await?;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(upsert_by_date(&mut tx, entry).await?);
        }
        tx.commit().await?;

        Ok(ids)
    }

    pub async fn update(&self, id: i64, patch: MoodEntryPatch) -> AppResult<i64> {
        patch.validate()?;

        let mut entry = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Mood entry {id} not found")))?;
        let original_date = entry.date;
        patch.apply_to(&mut entry);

        // Moving an entry onto a day that already has one would leave two rows for that date.
        if entry.date != original_date {
            if self.get_by_date(entry.date).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "An entry for {} already exists",
                    entry.date
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE mood_entries SET
                date = $2,
                mood = $3,
                dose = $4,
                clonazepam_drops = $5,
                comment = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(entry.date)
        .bind(entry.mood)
        .bind(entry.dose)
        .bind(entry.clonazepam_drops)
        .bind(&entry.comment)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Deleting an absent id is a no-op.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM mood_entries WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    pub async fn clear_all(&self) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM mood_entries")
            .execute(&self.db)
            .await?;
        tracing::info!(removed = result.rows_affected(), "Cleared local store");
        Ok(())
    }

    pub async fn get_stats(&self) -> AppResult<EntryStats> {
        let (total, mood, dose, drops) = sqlx::query_as::<_, (i64, Option<f64>, Option<f64>, Option<f64>)>(
            r#"
            SELECT
                COUNT(*),
                AVG(mood),
                AVG(dose),
                AVG(clonazepam_drops)
            FROM mood_entries
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(EntryStats {
            total_entries: total,
            average_mood: round2(mood.unwrap_or(0.0)),
            average_dose: round2(dose.unwrap_or(0.0)),
            average_secondary_dose: round2(drops.unwrap_or(0.0)),
        })
    }

    pub async fn export_all(&self) -> AppResult<Vec<MoodEntry>> {
        self.get_all().await
    }

    /// Replaces the whole collection in one transaction. Incoming ids are
    /// discarded; `created_at` is kept when present, `updated_at` is stamped now.
    pub async fn import_all(&self, entries: &[MoodEntry]) -> AppResult<()> {
        for entry in entries {
            entry.validate()?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM mood_entries")
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO mood_entries (date, mood, dose, clonazepam_drops, comment, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(entry.date)
            .bind(entry.mood)
            .bind(entry.dose)
            .bind(entry.clonazepam_drops)
            .bind(&entry.comment)
            .bind(entry.created_at.unwrap_or(now))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(count = entries.len(), "Imported entries into local store");
        Ok(())
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mood_entries")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}


async fn upsert_by_date(conn: &mut SqliteConnection, entry: &NewMoodEntry) -> AppResult<i64> {
    let now = Utc::now();

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM mood_entries WHERE date = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(entry.date)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        sqlx::query(
            r#"
            UPDATE mood_entries SET
                mood = $2,
                dose = $3,
                clonazepam_drops = $4,
                comment = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(entry.mood)
        .bind(entry.dose)
        .bind(entry.clonazepam_drops)
        .bind(&entry.comment)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        tracing::debug!(id, date = %entry.date, "Updated mood entry");
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO mood_entries (date, mood, dose, clonazepam_drops, comment, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING id
        "#,
    )
    .bind(entry.date)
    .bind(entry.mood)
    .bind(entry.dose)
    .bind(entry.clonazepam_drops)
    .bind(&entry.comment)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    tracing::debug!(id, date = %entry.date, "Inserted mood entry");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::services::query::in_month;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_entry(date: &str, mood: i64, comment: &str) -> NewMoodEntry {
        NewMoodEntry {
            date: day(date),
            mood,
            dose: 50,
            clonazepam_drops: 2,
            comment: comment.to_string(),
        }
    }

    async fn store() -> LocalStore {
        LocalStore::new(create_test_pool().await)
    }

    #[tokio::test]
    async fn test_save_same_date_updates_in_place() {
        let store = store().await;

        let first = store.save(new_entry("2025-09-10", 2, "rough")).await.unwrap();
        let second = store.save(new_entry("2025-09-10", 4, "better")).await.unwrap();

        assert_eq!(first, second);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);

        let entry = store.get_by_date(day("2025-09-10")).await.unwrap().unwrap();
        assert_eq!(entry.id, Some(first));
        assert_eq!(entry.mood, 4);
        assert_eq!(entry.comment, "better");
        assert!(entry.created_at.is_some());
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_dose() {
        let store = store().await;
        let mut entry = new_entry("2025-09-10", 3, "");
        entry.dose = 75;

        let result = store.save(entry).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_all_is_sorted_by_date() {
        let store = store().await;
        store.save(new_entry("2025-09-12", 3, "")).await.unwrap();
        store.save(new_entry("2025-09-01", 3, "")).await.unwrap();
        store.save(new_entry("2025-09-05", 3, "")).await.unwrap();

        let dates: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![day("2025-09-01"), day("2025-09-05"), day("2025-09-12")]);
    }

    #[tokio::test]
    async fn test_get_for_month_is_inclusive_of_boundaries() {
        let store = store().await;
        for date in ["2025-08-31", "2025-09-01", "2025-09-15", "2025-09-30", "2025-10-01"] {
            store.save(new_entry(date, 3, "")).await.unwrap();
        }

        let september = store.get_for_month(2025, 9).await.unwrap();
        let dates: Vec<_> = september.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day("2025-09-01"), day("2025-09-15"), day("2025-09-30")]);
        assert!(september.iter().all(|e| in_month(e, 2025, 9)));
    }

    #[tokio::test]
    async fn test_get_for_month_rejects_invalid_month() {
        let store = store().await;
        let result = store.get_for_month(2025, 13).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_in_range_inclusive() {
        let store = store().await;
        for date in ["2025-09-01", "2025-09-02", "2025-09-03", "2025-09-04"] {
            store.save(new_entry(date, 3, "")).await.unwrap();
        }

        let range = store
            .get_in_range(day("2025-09-02"), day("2025-09-03"))
            .await
            .unwrap();
        assert_eq!(range.len(), 2);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = store().await;
        store.save(new_entry("2025-09-01", 3, "Long WALK by the river")).await.unwrap();
        store.save(new_entry("2025-09-02", 3, "stayed in")).await.unwrap();

        let hits = store.search("walk").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].date, day("2025-09-01"));
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_and_missing_id_is_not_found() {
        let store = store().await;
        let id = store.save(new_entry("2025-09-01", 3, "")).await.unwrap();
        let before = store.get_by_date(day("2025-09-01")).await.unwrap().unwrap();

        let patch = MoodEntryPatch {
            comment: Some("edited".into()),
            ..Default::default()
        };
        assert_eq!(store.update(id, patch).await.unwrap(), id);

        let after = store.get_by_date(day("2025-09-01")).await.unwrap().unwrap();
        assert_eq!(after.comment, "edited");
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);

        let missing = store.update(9999, MoodEntryPatch::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_onto_taken_date_conflicts() {
        let store = store().await;
        store.save(new_entry("2025-09-01", 3, "first")).await.unwrap();
        let second = store.save(new_entry("2025-09-02", 4, "second")).await.unwrap();

        let patch = MoodEntryPatch {
            date: Some(day("2025-09-01")),
            ..Default::default()
        };
        let result = store.update(second, patch).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|e| e.date == day("2025-09-01")).count(), 1);

        // Moving to a free date is still allowed.
        let patch = MoodEntryPatch {
            date: Some(day("2025-09-05")),
            ..Default::default()
        };
        assert_eq!(store.update(second, patch).await.unwrap(), second);
        assert!(store.get_by_date(day("2025-09-02")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_all_is_all_or_nothing() {
        let store = store().await;
        store.save(new_entry("2025-09-01", 2, "kept")).await.unwrap();

        let mut bad = new_entry("2025-09-03", 3, "");
        bad.dose = 75;
        let result = store
            .save_all(&[new_entry("2025-09-02", 4, "new"), bad])
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.count().await.unwrap(), 1);

        let ids = store
            .save_all(&[new_entry("2025-09-01", 5, "replaced"), new_entry("2025-09-02", 4, "new")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        let first = store.get_by_date(day("2025-09-01")).await.unwrap().unwrap();
        assert_eq!(first.mood, 5);
        assert_eq!(first.id, Some(ids[0]));
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_noop() {
        let store = store().await;
        let id = store.save(new_entry("2025-09-01", 3, "")).await.unwrap();

        store.delete(9999).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.delete(id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_empty_and_rounded() {
        let store = store().await;
        assert_eq!(store.get_stats().await.unwrap(), EntryStats::default());

        store.save(new_entry("2025-09-01", 4, "")).await.unwrap();
        store.save(new_entry("2025-09-02", 3, "")).await.unwrap();
        store.save(new_entry("2025-09-03", 2, "")).await.unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.average_mood, 3.0);
        assert_eq!(stats.average_dose, 50.0);
        assert_eq!(stats.average_secondary_dose, 2.0);
    }

    #[tokio::test]
    async fn test_import_reassigns_ids() {
        let store = store().await;
        store.save(new_entry("2024-01-01", 1, "old")).await.unwrap();

        let incoming: Vec<MoodEntry> = ["2025-09-01", "2025-09-02", "2025-09-03"]
            .iter()
            .map(|d| MoodEntry {
                id: Some(42),
                date: day(d),
                mood: 3,
                dose: 0,
                clonazepam_drops: 0,
                comment: String::new(),
                created_at: None,
                updated_at: None,
            })
            .collect();

        store.import_all(&incoming).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.id != Some(42)));
        assert!(store.get_by_date(day("2024-01-01")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_import_invalid_entry_leaves_store_untouched() {
        let store = store().await;
        store.save(new_entry("2024-01-01", 1, "keep me")).await.unwrap();

        let mut bad = MoodEntry {
            id: None,
            date: day("2025-09-01"),
            mood: 3,
            dose: 0,
            clonazepam_drops: 0,
            comment: String::new(),
            created_at: None,
            updated_at: None,
        };
        let good = bad.clone();
        bad.mood = 9;

        let result = store.import_all(&[good, bad]).await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_export_import_round_trip_keeps_content() {
        let store = store().await;
        store.save(new_entry("2025-09-01", 2, "a")).await.unwrap();
        store.save(new_entry("2025-09-02", 5, "b")).await.unwrap();

        let exported = store.export_all().await.unwrap();
        store.import_all(&exported).await.unwrap();
        let reimported = store.get_all().await.unwrap();

        assert_eq!(reimported.len(), exported.len());
        let before: Vec<_> = exported.iter().map(MoodEntry::to_new).collect();
        let after: Vec<_> = reimported.iter().map(MoodEntry::to_new).collect();
        assert_eq!(before, after);
        assert_eq!(reimported[0].created_at, exported[0].created_at);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = store().await;
        store.save(new_entry("2025-09-01", 2, "")).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
