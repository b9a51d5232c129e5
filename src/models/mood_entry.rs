use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Discrete medication levels a day can be logged with.
pub const DOSE_LEVELS: [i64; 4] = [0, 50, 100, 150];

pub const MOOD_MIN: i64 = 1;
pub const MOOD_MAX: i64 = 5;

/// One day's journal record as held by the local store.
///
/// `id` and the timestamps are owned by the store: they are absent on entries
/// that have not been saved yet (e.g. pulled from the remote snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub mood: i64,
    pub dose: i64,
    #[serde(default)]
    pub clonazepam_drops: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for `save`: everything but identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMoodEntry {
    pub date: NaiveDate,
    pub mood: i64,
    pub dose: i64,
    #[serde(default)]
    pub clonazepam_drops: i64,
    #[serde(default)]
    pub comment: String,
}

/// Partial update for `update(id, ..)`; absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntryPatch {
    pub date: Option<NaiveDate>,
    pub mood: Option<i64>,
    pub dose: Option<i64>,
    pub clonazepam_drops: Option<i64>,
    pub comment: Option<String>,
}

fn check_mood(errors: &mut ValidationErrors, mood: i64) {
    if !(MOOD_MIN..=MOOD_MAX).contains(&mood) {
        let mut err = ValidationError::new("range");
        err.message = Some("Mood must be between 1 and 5".into());
        errors.add("mood", err);
    }
}

fn check_dose(errors: &mut ValidationErrors, dose: i64) {
    if !DOSE_LEVELS.contains(&dose) {
        let mut err = ValidationError::new("dose_level");
        err.message = Some("Dose must be one of 0, 50, 100, 150".into());
        errors.add("dose", err);
    }
}

fn check_drops(errors: &mut ValidationErrors, drops: i64) {
    if drops < 0 {
        let mut err = ValidationError::new("range");
        err.message = Some("Clonazepam drops cannot be negative".into());
        errors.add("clonazepamDrops", err);
    }
}

fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl Validate for MoodEntry {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_mood(&mut errors, self.mood);
        check_dose(&mut errors, self.dose);
        check_drops(&mut errors, self.clonazepam_drops);
        finish(errors)
    }
}

impl Validate for NewMoodEntry {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_mood(&mut errors, self.mood);
        check_dose(&mut errors, self.dose);
        check_drops(&mut errors, self.clonazepam_drops);
        finish(errors)
    }
}

impl Validate for MoodEntryPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(mood) = self.mood {
            check_mood(&mut errors, mood);
        }
        if let Some(dose) = self.dose {
            check_dose(&mut errors, dose);
        }
        if let Some(drops) = self.clonazepam_drops {
            check_drops(&mut errors, drops);
        }
        finish(errors)
    }
}

impl MoodEntry {
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Strips store-owned fields, keeping the user-entered ones.
    pub fn to_new(&self) -> NewMoodEntry {
        NewMoodEntry {
            date: self.date,
            mood: self.mood,
            dose: self.dose,
            clonazepam_drops: self.clonazepam_drops,
            comment: self.comment.clone(),
        }
    }
}

impl MoodEntryPatch {
    pub fn apply_to(self, entry: &mut MoodEntry) {
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(mood) = self.mood {
            entry.mood = mood;
        }
        if let Some(dose) = self.dose {
            entry.dose = dose;
        }
        if let Some(drops) = self.clonazepam_drops {
            entry.clonazepam_drops = drops;
        }
        if let Some(comment) = self.comment {
            entry.comment = comment;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(mood: i64, dose: i64) -> MoodEntry {
        MoodEntry {
            id: None,
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            mood,
            dose,
            clonazepam_drops: 0,
            comment: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_mood_and_dose_must_be_enumerated() {
        assert!(entry(3, 50).is_valid());
        assert!(!entry(0, 50).is_valid());
        assert!(!entry(6, 50).is_valid());
        assert!(!entry(3, 75).is_valid());
    }

    #[test]
    fn test_backup_field_names_deserialize() {
        let value = json!({
            "id": 7,
            "date": "2025-09-14",
            "dose": 100,
            "clonazepamDrops": 4,
            "mood": 2,
            "comment": "slept badly",
            "createdAt": "2025-09-14T08:00:00Z",
            "updatedAt": "2025-09-14T09:30:00Z"
        });

        let parsed: MoodEntry = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.id, Some(7));
        assert_eq!(parsed.clonazepam_drops, 4);
        assert_eq!(parsed.comment, "slept badly");
        assert!(parsed.created_at.is_some());
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut target = entry(3, 50);
        target.comment = "keep".into();

        MoodEntryPatch {
            mood: Some(5),
            ..Default::default()
        }
        .apply_to(&mut target);

        assert_eq!(target.mood, 5);
        assert_eq!(target.dose, 50);
        assert_eq!(target.comment, "keep");
    }

    #[test]
    fn test_patch_validation_reports_field() {
        let patch = MoodEntryPatch {
            dose: Some(20),
            ..Default::default()
        };
        let errors = patch.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("dose"));
    }
}
