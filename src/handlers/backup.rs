use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::AppState;

pub async fn export_backup(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let body = state.service.export_backup().await?;
    let filename = format!(
        "attachment; filename=\"mood-backup-{}.json\"",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    ))
}

/// Replaces the whole local journal with the uploaded file.
pub async fn import_backup(State(state): State<AppState>, body: String) -> AppResult<Json<Value>> {
    let imported = state.service.import_backup(&body).await?;
    tracing::info!(imported, "Backup imported");
    Ok(Json(json!({ "imported": imported })))
}
