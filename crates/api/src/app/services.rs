//! Ledger wiring for the HTTP layer.
//!
//! Handlers talk to [`AppServices`] only; whether a posting goes straight to
//! the ledger or through the worker queue is decided once, at startup.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tally_accounting::{JournalRow, Ledger, PostOutcome, ReadMode, Transaction};
use tally_core::{AccountId, Amount};
use tally_infra::{
    CommandError, CommandHandler, LedgerCommand, LedgerWorker, WorkerError, WorkerState,
};
use tracing::error;

use crate::config::{ApiConfig, ExecutionMode};

enum Executor {
    Direct,
    Queued {
        worker: LedgerWorker,
        reply_timeout: Duration,
    },
}

pub struct AppServices {
    ledger: Arc<Ledger>,
    executor: Executor,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("execution", &self.execution())
            .field("transactions", &self.ledger.len())
            .finish()
    }
}

impl AppServices {
    /// Wire services around an existing ledger (e.g. one seeded with opening
    /// balances). In queued mode this starts the ledger worker.
    pub fn build(ledger: Arc<Ledger>, config: &ApiConfig) -> Result<Self, WorkerError> {
        let executor = match config.execution {
            ExecutionMode::Direct => Executor::Direct,
            ExecutionMode::Queued => {
                let worker = LedgerWorker::spawn_supervised(
                    Arc::clone(&ledger),
                    config.worker.clone(),
                    |failure| {
                        error!(error = %failure, "ledger worker is down; postings will be refused");
                    },
                )?;
                Executor::Queued {
                    worker,
                    reply_timeout: config.reply_timeout,
                }
            }
        };

        Ok(Self { ledger, executor })
    }

    pub fn execution(&self) -> ExecutionMode {
        match self.executor {
            Executor::Direct => ExecutionMode::Direct,
            Executor::Queued { .. } => ExecutionMode::Queued,
        }
    }

    /// `None` in direct mode.
    pub fn worker_state(&self) -> Option<WorkerState> {
        match &self.executor {
            Executor::Direct => None,
            Executor::Queued { worker, .. } => Some(worker.state()),
        }
    }

    /// Apply a posting on the configured path.
    ///
    /// Blocking: in queued mode this waits (bounded) for the worker's reply.
    /// Async callers should run it on a blocking thread.
    pub fn post(&self, command: LedgerCommand) -> Result<PostOutcome, CommandError> {
        match &self.executor {
            Executor::Direct => self.ledger.handle(&command).map_err(CommandError::from),
            Executor::Queued {
                worker,
                reply_timeout,
            } => worker.submit_timeout(command, *reply_timeout),
        }
    }

    pub fn balances(&self, mode: ReadMode) -> BTreeMap<AccountId, Amount> {
        self.ledger.balances(mode)
    }

    pub fn transactions(&self, mode: ReadMode) -> Vec<Transaction> {
        self.ledger.transactions(mode)
    }

    pub fn journal(&self, account_id: &AccountId, mode: ReadMode) -> Vec<JournalRow> {
        self.ledger.journal(account_id, mode)
    }

    /// Ask the worker to stop (no-op in direct mode). Later postings get 503.
    pub fn stop(&self) {
        if let Executor::Queued { worker, .. } = &self.executor {
            worker.stop();
        }
    }
}
