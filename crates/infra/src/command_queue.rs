//! Queued execution path for ledger postings.
//!
//! Callers that need a total order of effects submit [`LedgerCommand`]s into
//! a bounded queue instead of calling the [`Ledger`] directly. A single
//! worker drains the queue (see [`crate::workers::LedgerWorker`]) and answers
//! each command on its own reply channel.
//!
//! ```text
//! caller ──enqueue──▶ [bounded queue] ──▶ worker ──▶ Ledger
//!   ▲                                        │
//!   └──────────── reply channel (cap 1) ◀────┘
//! ```
//!
//! ## Reply guarantee
//!
//! A caller never blocks forever on a dead worker. Reply senders travel with
//! the command; if the worker exits (stop or crash) before answering, the
//! sender is dropped and the caller observes [`CommandError::WorkerUnavailable`].
//! [`CommandSender::submit_timeout`] additionally bounds the wait.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use thiserror::Error;

use tally_accounting::{
    DepositRequest, Ledger, PostOutcome, TransferRequest, WithdrawRequest,
};
use tally_core::{DomainError, DomainResult, TransactionId};

/// A posting request routed through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Deposit(DepositRequest),
    Withdraw(WithdrawRequest),
    Transfer(TransferRequest),
}

impl LedgerCommand {
    pub fn id(&self) -> &TransactionId {
        match self {
            LedgerCommand::Deposit(r) => &r.id,
            LedgerCommand::Withdraw(r) => &r.id,
            LedgerCommand::Transfer(r) => &r.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerCommand::Deposit(_) => "deposit",
            LedgerCommand::Withdraw(_) => "withdraw",
            LedgerCommand::Transfer(_) => "transfer",
        }
    }
}

impl From<DepositRequest> for LedgerCommand {
    fn from(value: DepositRequest) -> Self {
        LedgerCommand::Deposit(value)
    }
}

impl From<WithdrawRequest> for LedgerCommand {
    fn from(value: WithdrawRequest) -> Self {
        LedgerCommand::Withdraw(value)
    }
}

impl From<TransferRequest> for LedgerCommand {
    fn from(value: TransferRequest) -> Self {
        LedgerCommand::Transfer(value)
    }
}

/// What the worker sends back: the ledger's outcome, unchanged.
pub type CommandReply = DomainResult<PostOutcome>;

/// Executes commands on behalf of the worker.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, command: &LedgerCommand) -> CommandReply;
}

impl CommandHandler for Ledger {
    fn handle(&self, command: &LedgerCommand) -> CommandReply {
        match command {
            LedgerCommand::Deposit(req) => self.deposit(req),
            LedgerCommand::Withdraw(req) => self.withdraw(req),
            LedgerCommand::Transfer(req) => self.transfer(req),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The ledger rejected the command (forwarded verbatim).
    #[error(transparent)]
    Rejected(#[from] DomainError),

    /// The worker is not running, or exited before replying.
    #[error("ledger worker is unavailable")]
    WorkerUnavailable,

    /// `try_enqueue` found the queue at capacity.
    #[error("command queue is full")]
    QueueFull,

    /// No reply within the caller's deadline. The command may still be applied.
    #[error("timed out waiting for ledger worker reply")]
    Timeout,
}

/// Queue item: a command plus the channel its reply goes to.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) command: LedgerCommand,
    pub(crate) reply: SyncSender<CommandReply>,
}

/// Create the bounded queue shared by producers and the worker.
pub(crate) fn bounded(capacity: usize) -> (CommandSender, Receiver<Envelope>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (CommandSender { tx }, rx)
}

/// Producer side of the queue. Cheap to clone; one per caller thread is fine.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: SyncSender<Envelope>,
}

impl CommandSender {
    /// Enqueue, blocking while the queue is full.
    pub fn enqueue(&self, command: impl Into<LedgerCommand>) -> Result<PendingReply, CommandError> {
        let (envelope, pending) = Self::envelope(command.into());
        self.tx
            .send(envelope)
            .map_err(|_| CommandError::WorkerUnavailable)?;
        Ok(pending)
    }

    /// Enqueue without blocking.
    pub fn try_enqueue(
        &self,
        command: impl Into<LedgerCommand>,
    ) -> Result<PendingReply, CommandError> {
        let (envelope, pending) = Self::envelope(command.into());
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(pending),
            Err(TrySendError::Full(_)) => Err(CommandError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(CommandError::WorkerUnavailable),
        }
    }

    /// Enqueue and block until the worker replies.
    pub fn submit(&self, command: impl Into<LedgerCommand>) -> Result<PostOutcome, CommandError> {
        self.enqueue(command)?.wait()
    }

    /// Like [`submit`](Self::submit) but gives up waiting for the reply after
    /// `timeout`. Enqueueing itself still applies backpressure.
    pub fn submit_timeout(
        &self,
        command: impl Into<LedgerCommand>,
        timeout: Duration,
    ) -> Result<PostOutcome, CommandError> {
        self.enqueue(command)?.wait_timeout(timeout)
    }

    fn envelope(command: LedgerCommand) -> (Envelope, PendingReply) {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        (
            Envelope {
                command,
                reply: reply_tx,
            },
            PendingReply { rx: reply_rx },
        )
    }
}

/// Handle for a command that has been accepted by the queue.
#[derive(Debug)]
pub struct PendingReply {
    rx: Receiver<CommandReply>,
}

impl PendingReply {
    pub fn wait(self) -> Result<PostOutcome, CommandError> {
        match self.rx.recv() {
            Ok(reply) => reply.map_err(CommandError::Rejected),
            Err(_) => Err(CommandError::WorkerUnavailable),
        }
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<PostOutcome, CommandError> {
        match self.rx.recv_timeout(timeout) {
            Ok(reply) => reply.map_err(CommandError::Rejected),
            Err(RecvTimeoutError::Timeout) => Err(CommandError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::WorkerUnavailable),
        }
    }
}
