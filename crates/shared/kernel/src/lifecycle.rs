//! Runner state and stop plumbing shared by the runner, the features and their tasks.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Runner states, in the order they are entered.
///
/// `Running` is skipped when a startup fails or a stop arrives while starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        })
    }
}

/// Read side of the runner state.
#[derive(Debug, Clone)]
pub struct LifecycleWatch {
    rx: watch::Receiver<LifecycleState>,
}

impl LifecycleWatch {
    pub(crate) const fn new(rx: watch::Receiver<LifecycleState>) -> Self {
        Self { rx }
    }

    #[must_use]
    pub fn current(&self) -> LifecycleState {
        *self.rx.borrow()
    }

    /// Waits until the runner reached `target` or any later state and returns
    /// the state observed.
    pub async fn wait_until(&mut self, target: LifecycleState) -> LifecycleState {
        let reached = self.rx.wait_for(|state| *state >= target).await.map(|state| *state);
        reached.unwrap_or_else(|_| self.current())
    }

    /// Resolves once every feature has started. `false` if the run ended first.
    pub async fn ready(&mut self) -> bool {
        self.wait_until(LifecycleState::Running).await == LifecycleState::Running
    }
}

/// Why the runner left the serving phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl+C or SIGTERM.
    Signal,
    /// [`StopHandle::stop`] or the trigger passed to `Runner::run_until`.
    Requested,
    /// The server feature's loop returned on its own.
    ServerExited,
    /// A critical background task returned an error.
    TaskFailed { feature: String, task: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("signal"),
            Self::Requested => f.write_str("requested"),
            Self::ServerExited => f.write_str("server exited"),
            Self::TaskFailed { feature, task } => write!(f, "task '{task}' of '{feature}' failed"),
        }
    }
}

/// Cloneable trigger for shutting the runner down. The first reason wins.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self { tx: Arc::new(watch::Sender::new(None)) }
    }

    /// Requests a stop. Returns `false` when a stop was already requested.
    pub fn stop(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::info!(%reason, "Stop requested");
            *current = Some(reason);
            true
        })
    }

    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }

    #[must_use]
    pub fn signal(&self) -> StopSignal {
        StopSignal { rx: self.tx.subscribe() }
    }
}

/// Future-friendly view of a [`StopHandle`], handed to server loops and tasks.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<Option<StopReason>>,
}

impl StopSignal {
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves once a stop was requested.
    pub async fn wait(&mut self) -> StopReason {
        let reason = self.rx.wait_for(Option::is_some).await.map(|reason| (*reason).clone());
        reason.ok().flatten().unwrap_or(StopReason::Requested)
    }
}
