//! Background workers.

pub mod ledger_worker;
pub mod supervisor;

pub use ledger_worker::LedgerWorker;
pub use supervisor::{Shutdown, Worker, WorkerError, WorkerFailure, WorkerState};
