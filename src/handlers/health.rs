use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "moodlog-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready once the local store answers. The remote snapshot is optional, so
/// its state is reported but never fails the check.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (db, remote_data) = tokio::join!(
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db),
        state.service.remote().has_data()
    );

    let remote = match (state.config.remote.edge_config.is_empty(), remote_data) {
        (true, _) => "unconfigured",
        (false, true) => "published",
        (false, false) => "empty",
    };
    let checks = json!({
        "database": if db.is_ok() { "ok" } else { "failed" },
        "remote": remote,
    });

    if db.is_ok() {
        (StatusCode::OK, Json(json!({ "status": "ready", "checks": checks })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": checks })),
        )
    }
}
