//! Single consumer for the ledger command queue.
//!
//! Exactly one thread pulls [`LedgerCommand`]s in FIFO order and executes
//! them against a [`CommandHandler`] (normally the shared [`Ledger`]).
//! The thread runs under a [`Worker`] supervisor, so a panicking handler
//! marks the worker `Crashed` and fires the failure hook instead of
//! silently killing the consumer.
//!
//! [`Ledger`]: tally_accounting::Ledger

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tally_accounting::PostOutcome;
use tracing::{debug, info, warn};

use crate::command_queue::{
    self, CommandError, CommandHandler, CommandSender, Envelope, LedgerCommand,
};
use crate::config::WorkerConfig;
use crate::workers::supervisor::{Shutdown, Worker, WorkerError, WorkerFailure, WorkerState};

/// Running ledger worker plus the producer handle for its queue.
#[derive(Debug)]
pub struct LedgerWorker {
    worker: Worker,
    sender: CommandSender,
}

impl LedgerWorker {
    /// Start the worker with no failure hook.
    pub fn spawn<H>(handler: Arc<H>, config: WorkerConfig) -> Result<Self, WorkerError>
    where
        H: CommandHandler + ?Sized + 'static,
    {
        let worker = Worker::new(config.name.clone());
        Self::start(handler, config, worker)
    }

    /// Start the worker; `hook` runs once if the consumer crashes.
    pub fn spawn_supervised<H, F>(
        handler: Arc<H>,
        config: WorkerConfig,
        hook: F,
    ) -> Result<Self, WorkerError>
    where
        H: CommandHandler + ?Sized + 'static,
        F: Fn(&WorkerFailure) + Send + Sync + 'static,
    {
        let worker = Worker::new(config.name.clone()).on_failure(hook);
        Self::start(handler, config, worker)
    }

    fn start<H>(
        handler: Arc<H>,
        config: WorkerConfig,
        mut worker: Worker,
    ) -> Result<Self, WorkerError>
    where
        H: CommandHandler + ?Sized + 'static,
    {
        let (sender, queue) = command_queue::bounded(config.queue_capacity);
        let poll_interval = config.poll_interval;
        let name = config.name;

        worker.start(move |shutdown| {
            command_loop(&name, handler.as_ref(), &queue, poll_interval, &shutdown)
        })?;

        Ok(Self { worker, sender })
    }

    /// A new producer handle for this worker's queue.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn submit(&self, command: impl Into<LedgerCommand>) -> Result<PostOutcome, CommandError> {
        self.sender.submit(command)
    }

    /// See [`CommandSender::submit_timeout`].
    pub fn submit_timeout(
        &self,
        command: impl Into<LedgerCommand>,
        timeout: Duration,
    ) -> Result<PostOutcome, CommandError> {
        self.sender.submit_timeout(command, timeout)
    }

    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    pub fn is_alive(&self) -> bool {
        self.worker.is_alive()
    }

    /// Request a stop. Commands still queued are abandoned; their callers see
    /// [`CommandError::WorkerUnavailable`].
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Stop and wait for the consumer thread to exit.
    pub fn shutdown(self) -> WorkerState {
        self.worker.shutdown()
    }
}

fn command_loop<H>(
    name: &str,
    handler: &H,
    queue: &Receiver<Envelope>,
    poll_interval: Duration,
    shutdown: &Shutdown,
) -> Result<(), Infallible>
where
    H: CommandHandler + ?Sized,
{
    info!(worker = name, "ledger worker accepting commands");

    while !shutdown.is_cancelled() {
        let Envelope { command, reply } = match queue.recv_timeout(poll_interval) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = handler.handle(&command);
        match &outcome {
            Ok(PostOutcome::Applied(_)) => {
                debug!(worker = name, kind = command.kind(), tx_id = %command.id(), "command applied");
            }
            Ok(PostOutcome::Duplicate) => {
                debug!(worker = name, kind = command.kind(), tx_id = %command.id(), "duplicate command");
            }
            Err(e) => {
                debug!(worker = name, kind = command.kind(), tx_id = %command.id(), error = %e, "command rejected");
            }
        }

        // The effect stands even if the caller stopped waiting.
        if reply.send(outcome).is_err() {
            warn!(worker = name, tx_id = %command.id(), "caller no longer waiting for reply");
        }
    }

    info!(worker = name, "ledger worker stopped accepting commands");
    Ok(())
}
