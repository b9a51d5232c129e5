//! Pure aggregate calculations over entry lists.

use std::collections::HashMap;

use chrono::Duration;

use crate::models::mood_entry::MoodEntry;
use crate::models::stats::{EntryStats, SnapshotStats};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of one field, summed as f64 so large counts cannot overflow.
fn average(entries: &[MoodEntry], field: impl Fn(&MoodEntry) -> i64) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let sum: f64 = entries.iter().map(|e| field(e) as f64).sum();
    round2(sum / entries.len() as f64)
}

pub fn summarize(entries: &[MoodEntry]) -> EntryStats {
    EntryStats {
        total_entries: entries.len() as i64,
        average_mood: average(entries, |e| e.mood),
        average_dose: average(entries, |e| e.dose),
        average_secondary_dose: average(entries, |e| e.clonazepam_drops),
    }
}

/// Consecutive calendar days with an entry, counted back from the latest one.
pub fn streak_days(entries: &[MoodEntry]) -> i64 {
    let mut dates: Vec<_> = entries.iter().map(|e| e.date).collect();
    dates.sort_unstable();
    dates.dedup();

    let Some(&latest) = dates.last() else {
        return 0;
    };

    let mut streak = 0i64;
    let mut check_date = latest;
    for date in dates.iter().rev() {
        if *date == check_date {
            streak += 1;
            check_date -= Duration::days(1);
        } else {
            break;
        }
    }
    streak
}

/// Modal mood; ties go to the higher mood, 0 for no entries.
pub fn most_frequent_mood(entries: &[MoodEntry]) -> i64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.mood).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(mood, count)| (count, mood))
        .map(|(mood, _)| mood)
        .unwrap_or(0)
}

pub fn snapshot_stats(entries: &[MoodEntry]) -> SnapshotStats {
    SnapshotStats {
        total_entries: entries.len() as i64,
        average_mood: average(entries, |e| e.mood),
        streak_days: streak_days(entries),
        most_frequent_mood: most_frequent_mood(entries),
        last_entry_date: entries.iter().map(|e| e.date).max(),
    }
}
