use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use tally_accounting::{DepositRequest, PostOutcome, TransferRequest, WithdrawRequest};
use tally_core::AccountId;
use tally_infra::LedgerCommand;

use crate::app::dto::{AlreadyProcessed, ConsistencyQuery};
use crate::app::errors;
use crate::app::services::AppServices;

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DepositRequest>,
) -> axum::response::Response {
    post_command(services, body.into()).await
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<WithdrawRequest>,
) -> axum::response::Response {
    post_command(services, body.into()).await
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<TransferRequest>,
) -> axum::response::Response {
    post_command(services, body.into()).await
}

async fn post_command(
    services: Arc<AppServices>,
    command: LedgerCommand,
) -> axum::response::Response {
    let id = command.id().clone();

    // Queued mode blocks on the worker's reply; keep that off the async runtime.
    let result = tokio::task::spawn_blocking(move || services.post(command)).await;

    match result {
        Ok(Ok(PostOutcome::Applied(tx))) => (StatusCode::CREATED, Json(tx)).into_response(),
        Ok(Ok(PostOutcome::Duplicate)) => {
            (StatusCode::FOUND, Json(AlreadyProcessed::new(&id))).into_response()
        }
        Ok(Err(e)) => errors::command_error_to_response(e),
        Err(join_err) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            join_err.to_string(),
        ),
    }
}

pub async fn list_balances(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ConsistencyQuery>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.balances(query.mode()))).into_response()
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ConsistencyQuery>,
) -> axum::response::Response {
    (StatusCode::OK, Json(services.transactions(query.mode()))).into_response()
}

pub async fn get_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<String>,
    Query(query): Query<ConsistencyQuery>,
) -> axum::response::Response {
    let account_id = AccountId::new(account_id);
    let rows = services.journal(&account_id, query.mode());
    if rows.is_empty() {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no journal entries for account {account_id}"),
        );
    }
    (StatusCode::OK, Json(rows)).into_response()
}
