use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tally_core::DomainError;
use tally_infra::CommandError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match err {
        DomainError::InvalidAmount { .. }
        | DomainError::SameAccount { .. }
        | DomainError::AmountOutOfRange { .. } => StatusCode::BAD_REQUEST,
        DomainError::InsufficientFunds { .. } => StatusCode::CONFLICT,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn command_error_to_response(err: CommandError) -> axum::response::Response {
    match err {
        CommandError::Rejected(e) => domain_error_to_response(e),
        CommandError::WorkerUnavailable => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "worker_unavailable",
            err.to_string(),
        ),
        CommandError::QueueFull => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "queue_full", err.to_string())
        }
        CommandError::Timeout => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "timeout", err.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
