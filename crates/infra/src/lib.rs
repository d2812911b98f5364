//! Infrastructure layer: queued execution, worker supervision, config.

pub mod command_queue;
pub mod config;
pub mod workers;

pub use command_queue::{
    CommandError, CommandHandler, CommandReply, CommandSender, LedgerCommand, PendingReply,
};
pub use config::WorkerConfig;
pub use workers::{LedgerWorker, Worker, WorkerError, WorkerFailure, WorkerState};
