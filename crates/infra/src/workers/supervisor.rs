//! Supervised background worker.
//!
//! Runs a single body on a named thread and owns its lifecycle:
//!
//! ```text
//! NotStarted --start--> Running --cancelled, body returns Ok--> Stopped
//!                          |
//!                          +--body panics or returns Err--> Crashed (failure hook)
//! ```
//!
//! `Stopped` and `Crashed` are terminal. There is no automatic restart: a
//! caller that wants one builds and starts a new `Worker` from its hook.

use std::any::Any;
use std::cell::Cell;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use thiserror::Error;
use tracing::{error, info, warn};

/// Lifecycle of a [`Worker`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Running,
    Stopped,
    Crashed,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Running,
            2 => WorkerState::Stopped,
            3 => WorkerState::Crashed,
            _ => WorkerState::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::NotStarted => 0,
            WorkerState::Running => 1,
            WorkerState::Stopped => 2,
            WorkerState::Crashed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Crashed)
    }
}

/// Why a worker crashed (passed to the failure hook).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFailure {
    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("worker failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {0} was already started")]
    AlreadyStarted(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

type FailureHook = Arc<dyn Fn(&WorkerFailure) + Send + Sync>;

/// Cooperative cancellation signal handed to the worker body.
///
/// Cancelled once [`Worker::stop`] is called or the owning `Worker` is dropped.
#[derive(Debug)]
pub struct Shutdown {
    rx: mpsc::Receiver<()>,
    cancelled: Cell<bool>,
}

impl Shutdown {
    /// Non-blocking; latches once cancellation has been observed.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                self.cancelled.set(true);
                true
            }
            Err(mpsc::TryRecvError::Empty) => false,
        }
    }
}

/// Handle to a supervised worker thread.
pub struct Worker {
    name: String,
    state: Arc<AtomicU8>,
    on_failure: Option<FailureHook>,
    shutdown: Option<mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl core::fmt::Debug for Worker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(AtomicU8::new(WorkerState::NotStarted.as_u8())),
            on_failure: None,
            shutdown: None,
            join: None,
        }
    }

    /// Hook invoked (on the worker thread) after the worker is marked crashed.
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WorkerFailure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_alive(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Spawn exactly one thread running `body`.
    ///
    /// The body must poll [`Shutdown::is_cancelled`] and return `Ok(())` once
    /// it observes cancellation. A panic or an `Err` marks the worker crashed.
    pub fn start<F, E>(&mut self, body: F) -> Result<(), WorkerError>
    where
        F: FnOnce(Shutdown) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        if self
            .state
            .compare_exchange(
                WorkerState::NotStarted.as_u8(),
                WorkerState::Running.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(WorkerError::AlreadyStarted(self.name.clone()));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let shutdown = Shutdown {
            rx: shutdown_rx,
            cancelled: Cell::new(false),
        };

        let name = self.name.clone();
        let state = Arc::clone(&self.state);
        let hook = self.on_failure.clone();

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || supervise(&name, &state, hook.as_deref(), body, shutdown));

        match spawned {
            Ok(join) => {
                self.shutdown = Some(shutdown_tx);
                self.join = Some(join);
                Ok(())
            }
            Err(e) => {
                self.state
                    .store(WorkerState::NotStarted.as_u8(), Ordering::SeqCst);
                Err(WorkerError::Spawn(e))
            }
        }
    }

    /// Request cancellation (non-blocking).
    pub fn stop(&self) {
        if let Some(tx) = &self.shutdown {
            let _ = tx.send(());
        }
    }

    /// Wait for the worker thread to exit.
    pub fn join(&mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Request cancellation and wait for the worker to stop.
    pub fn shutdown(mut self) -> WorkerState {
        self.stop();
        self.join();
        self.state()
    }
}

fn supervise<F, E>(
    name: &str,
    state: &AtomicU8,
    hook: Option<&(dyn Fn(&WorkerFailure) + Send + Sync)>,
    body: F,
    shutdown: Shutdown,
) where
    F: FnOnce(Shutdown) -> Result<(), E>,
    E: Display,
{
    info!(worker = name, "worker starting");

    let failure = match panic::catch_unwind(AssertUnwindSafe(move || body(shutdown))) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(WorkerFailure::Failed(e.to_string())),
        Err(payload) => Some(WorkerFailure::Panicked(panic_message(payload.as_ref()))),
    };

    let Some(failure) = failure else {
        state.store(WorkerState::Stopped.as_u8(), Ordering::SeqCst);
        info!(worker = name, "worker stopped");
        return;
    };

    state.store(WorkerState::Crashed.as_u8(), Ordering::SeqCst);
    error!(worker = name, error = %failure, "worker crashed");

    if let Some(hook) = hook {
        if panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))).is_err() {
            warn!(worker = name, "failure hook panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::time::Duration;

    fn idle_until_cancelled(shutdown: Shutdown) -> Result<(), Infallible> {
        while !shutdown.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    #[test]
    fn stop_moves_running_worker_to_stopped() {
        let mut worker = Worker::new("idle");
        assert_eq!(worker.state(), WorkerState::NotStarted);

        worker.start(idle_until_cancelled).unwrap();
        assert!(worker.is_alive());

        assert_eq!(worker.shutdown(), WorkerState::Stopped);
    }

    #[test]
    fn a_worker_starts_only_once() {
        let mut worker = Worker::new("once");
        worker.start(idle_until_cancelled).unwrap();

        let err = worker.start(idle_until_cancelled).unwrap_err();
        assert!(matches!(err, WorkerError::AlreadyStarted(name) if name == "once"));

        worker.shutdown();
    }

    #[test]
    fn panic_marks_crashed_and_invokes_hook_once() {
        let seen: Arc<Mutex<Vec<WorkerFailure>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut worker = Worker::new("boom").on_failure(move |failure| {
            sink.lock().unwrap().push(failure.clone());
        });
        worker
            .start(|_shutdown| -> Result<(), Infallible> { panic!("handler exploded") })
            .unwrap();
        worker.join();

        assert_eq!(worker.state(), WorkerState::Crashed);
        assert!(!worker.is_alive());
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[WorkerFailure::Panicked("handler exploded".to_string())]
        );
    }

    #[test]
    fn returned_error_is_a_crash() {
        let mut worker = Worker::new("err");
        worker.start(|_shutdown| Err("gave up")).unwrap();
        worker.join();
        assert_eq!(worker.state(), WorkerState::Crashed);
    }

    #[test]
    fn dropping_the_handle_cancels_the_body() {
        let (done_tx, done_rx) = mpsc::channel();
        let mut worker = Worker::new("dropped");
        worker
            .start(move |shutdown| {
                let res = idle_until_cancelled(shutdown);
                let _ = done_tx.send(());
                res
            })
            .unwrap();
        drop(worker);

        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn panicking_hook_does_not_escape() {
        let mut worker = Worker::new("bad-hook").on_failure(|_| panic!("hook failed"));
        worker.start(|_shutdown| Err("fail")).unwrap();
        worker.join();
        assert_eq!(worker.state(), WorkerState::Crashed);
    }
}
