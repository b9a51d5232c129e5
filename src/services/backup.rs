use serde_json::Value;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::mood_entry::MoodEntry;

const REQUIRED_KEYS: [&str; 3] = ["date", "dose", "mood"];

/// Parses a backup file (JSON array of entries). Any malformed element fails
/// the whole file; nothing is returned partially.
pub fn parse_backup(raw: &str) -> AppResult<Vec<MoodEntry>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("Backup is not valid JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(AppError::Validation("Backup must be a JSON array".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_item(index, item))
        .collect()
}

fn parse_item(index: usize, item: Value) -> AppResult<MoodEntry> {
    let Some(object) = item.as_object() else {
        return Err(AppError::Validation(format!("Entry {} is not an object", index)));
    };

    if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !object.contains_key(**key)) {
        return Err(AppError::Validation(format!(
            "Entry {} is missing required field '{}'",
            index, missing
        )));
    }

    let entry: MoodEntry = serde_json::from_value(item)
        .map_err(|e| AppError::Validation(format!("Entry {} is malformed: {}", index, e)))?;
    entry
        .validate()
        .map_err(|e| AppError::Validation(format!("Entry {}: {}", index, AppError::from(e))))?;

    Ok(entry)
}

pub fn render_backup(entries: &[MoodEntry]) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_falsy_values() {
        let raw = r#"[
            {"date": "2025-09-01", "dose": 0, "mood": 3, "clonazepamDrops": 0, "comment": ""},
            {"id": 99, "date": "2025-09-02", "dose": 150, "mood": 1, "clonazepamDrops": 5,
             "comment": "hard day", "createdAt": "2025-09-02T07:00:00Z", "updatedAt": "2025-09-02T07:00:00Z"}
        ]"#;

        let entries = parse_backup(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].clonazepam_drops, 5);
    }

    #[test]
    fn test_missing_key_rejects_whole_file() {
        let raw = r#"[
            {"date": "2025-09-01", "dose": 0, "mood": 3},
            {"date": "2025-09-02", "mood": 3}
        ]"#;

        let err = parse_backup(raw).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("'dose'"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_array_is_rejected() {
        assert!(matches!(
            parse_backup(r#"{"date": "2025-09-01"}"#),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(parse_backup("not json"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_out_of_range_value_is_rejected() {
        let raw = r#"[{"date": "2025-09-01", "dose": 25, "mood": 3}]"#;
        assert!(matches!(parse_backup(raw), Err(AppError::Validation(_))));
    }
}
