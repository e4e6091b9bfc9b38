use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    backend::{tables, Query},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct TableStatus {
    pub table: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub ok: bool,
    pub tables: Vec<TableStatus>,
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/health/backend", get(backend_health))
}

/// Counts every application table anonymously. A table that is missing or
/// locked down by policy shows up with the reason instead of failing the probe.
#[instrument(skip(state))]
pub async fn backend_health(State(state): State<AppState>) -> (StatusCode, Json<BackendHealth>) {
    let db = state.anon();
    let mut statuses = Vec::with_capacity(tables::ALL.len());
    for table in tables::ALL {
        let status = match db.count(&Query::from(table)).await {
            Ok(n) => TableStatus {
                table,
                ok: true,
                rows: Some(n),
                error: None,
            },
            Err(e) => {
                warn!(table, error = %e, "table probe failed");
                TableStatus {
                    table,
                    ok: false,
                    rows: None,
                    error: Some(e.friendly()),
                }
            }
        };
        statuses.push(status);
    }

    let ok = statuses.iter().all(|s| s.ok);
    let code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(BackendHealth { ok, tables: statuses }))
}
