//! Date and text selection shared by the local and remote read paths.

use chrono::{Datelike, NaiveDate};

use crate::models::mood_entry::MoodEntry;

/// First and last day of a calendar month, or `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

pub fn in_month(entry: &MoodEntry, year: i32, month: u32) -> bool {
    entry.date.year() == year && entry.date.month() == month
}

pub fn comment_matches(entry: &MoodEntry, needle_lower: &str) -> bool {
    entry.comment.to_lowercase().contains(needle_lower)
}

fn select(entries: &[MoodEntry], keep: impl Fn(&MoodEntry) -> bool) -> Vec<MoodEntry> {
    let mut kept: Vec<MoodEntry> = entries.iter().filter(|e| keep(e)).cloned().collect();
    kept.sort_by_key(|e| e.date);
    kept
}

pub fn select_all(entries: &[MoodEntry]) -> Vec<MoodEntry> {
    select(entries, |_| true)
}

pub fn select_month(entries: &[MoodEntry], year: i32, month: u32) -> Vec<MoodEntry> {
    select(entries, |e| in_month(e, year, month))
}

pub fn select_range(entries: &[MoodEntry], start: NaiveDate, end: NaiveDate) -> Vec<MoodEntry> {
    select(entries, |e| e.date >= start && e.date <= end)
}

pub fn select_matching(entries: &[MoodEntry], term: &str) -> Vec<MoodEntry> {
    let needle = term.to_lowercase();
    select(entries, |e| comment_matches(e, &needle))
}

/// Last entry recorded for `date`, mirroring the store's "latest wins".
pub fn select_date(entries: &[MoodEntry], date: NaiveDate) -> Option<MoodEntry> {
    entries.iter().rfind(|e| e.date == date).cloned()
}
