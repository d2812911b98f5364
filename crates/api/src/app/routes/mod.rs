use axum::{
    routing::{get, post},
    Router,
};

pub mod ledger;
pub mod system;

/// Router for the ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/deposit", post(ledger::deposit))
        .route("/withdraw", post(ledger::withdraw))
        .route("/transfer", post(ledger::transfer))
        .route("/balances", get(ledger::list_balances))
        .route("/transactions", get(ledger::list_transactions))
        .route("/journal/:account_id", get(ledger::get_journal))
}
