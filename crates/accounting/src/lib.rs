//! Accounting module (in-memory double-entry ledger).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod journal;
pub mod ledger;
pub mod model;

pub use journal::{journal_for, replay_balances};
pub use ledger::Ledger;
pub use model::{
    DepositRequest, Entry, JournalRow, PostOutcome, ReadMode, Transaction, TransferRequest,
    WithdrawRequest,
};
