use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mood_entry::{MoodEntry, NewMoodEntry};

/// Entry shape used by the sync API: externally generated string ids,
/// free-form notes, tags and an optional image. It has no medication fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    pub id: String,
    pub date: NaiveDate,
    pub mood: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Either of the two entry shapes, tagged on the wire by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryRecord {
    Journal(MoodEntry),
    Sync(SyncEntry),
}

impl SyncEntry {
    /// Medication fields have no counterpart here, so they come across as zero.
    pub fn to_new_entry(&self) -> NewMoodEntry {
        NewMoodEntry {
            date: self.date,
            mood: self.mood,
            dose: 0,
            clonazepam_drops: 0,
            comment: self.notes.clone().unwrap_or_default(),
        }
    }
}

impl From<&MoodEntry> for SyncEntry {
    fn from(entry: &MoodEntry) -> Self {
        let id = match entry.id {
            Some(id) => format!("local-{id}"),
            None => Uuid::new_v4().to_string(),
        };
        Self {
            id,
            date: entry.date,
            mood: entry.mood,
            notes: Some(entry.comment.clone()).filter(|c| !c.is_empty()),
            tags: Vec::new(),
            image_url: None,
        }
    }
}

impl EntryRecord {
    pub fn date(&self) -> NaiveDate {
        match self {
            EntryRecord::Journal(e) => e.date,
            EntryRecord::Sync(e) => e.date,
        }
    }

    pub fn mood(&self) -> i64 {
        match self {
            EntryRecord::Journal(e) => e.mood,
            EntryRecord::Sync(e) => e.mood,
        }
    }

    pub fn to_new_entry(&self) -> NewMoodEntry {
        match self {
            EntryRecord::Journal(e) => e.to_new(),
            EntryRecord::Sync(e) => e.to_new_entry(),
        }
    }
}
