use serde::{Deserialize, Serialize};

use tally_accounting::ReadMode;
use tally_core::TransactionId;

// -------------------------
// Request DTOs
// -------------------------
//
// Posting bodies deserialize straight into `DepositRequest`,
// `WithdrawRequest` and `TransferRequest`.

/// `?consistent=true|false` on read endpoints (default `true`).
#[derive(Debug, Default, Deserialize)]
pub struct ConsistencyQuery {
    pub consistent: Option<bool>,
}

impl ConsistencyQuery {
    pub fn mode(&self) -> ReadMode {
        self.consistent.map(ReadMode::from).unwrap_or_default()
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Body returned for an idempotent replay.
#[derive(Debug, Serialize)]
pub struct AlreadyProcessed<'a> {
    pub status: &'static str,
    pub id: &'a TransactionId,
}

impl<'a> AlreadyProcessed<'a> {
    pub fn new(id: &'a TransactionId) -> Self {
        Self {
            status: "already_processed",
            id,
        }
    }
}
