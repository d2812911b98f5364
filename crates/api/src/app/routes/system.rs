use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;
use crate::config::ExecutionMode;

/// Liveness plus the execution path in use. A crashed or stopped worker
/// turns this into 503 so orchestrators can restart the process.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let execution = match services.execution() {
        ExecutionMode::Direct => "direct",
        ExecutionMode::Queued => "queued",
    };
    let worker = services.worker_state();
    let healthy = worker.is_none_or(|state| !state.is_terminal());

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "execution": execution,
            "worker": worker.map(|s| format!("{s:?}").to_lowercase()),
        })),
    )
}
