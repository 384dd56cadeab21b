//! The lifecycle state machine.
//!
//! `NotStarted → Starting → Running → ShuttingDown → Stopped`, with
//! `Starting → ShuttingDown` when a startup fails or a stop arrives early.
//! Every hook is awaited on its own; features never run a phase concurrently.

use crate::binding::Bindings;
use crate::context::{FeatureContext, Phase};
use crate::error::{FeatureError, LifecycleError, ShutdownCause, ShutdownFailure};
use crate::lifecycle::{LifecycleState, LifecycleWatch, StopHandle, StopReason};
use crate::registry::{Registry, Slot};
use crate::signal::shutdown_signal;
use fhub_domain::config::LifecycleConfig;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Timing knobs of a [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Bound for each `on_shutdown` call unless the feature overrides it.
    pub shutdown_timeout: Duration,
    /// Time the server loop gets to return after a stop request.
    pub serve_grace: Duration,
}

impl RunnerConfig {
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_serve_grace(mut self, grace: Duration) -> Self {
        self.serve_grace = grace;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for RunnerConfig {
    fn from(config: &LifecycleConfig) -> Self {
        Self { shutdown_timeout: config.shutdown_timeout(), serve_grace: config.serve_grace() }
    }
}

/// Outcome of a clean run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub reason: StopReason,
    /// The stop arrived before every feature had started.
    pub interrupted: bool,
    /// Number of features whose `on_startup` completed.
    pub started: usize,
    /// The server loop outlived `serve_grace` and was dropped mid-flight.
    pub server_abandoned: bool,
}

/// How the serving phase ended.
#[derive(Debug)]
enum ServeEnd {
    Idle,
    Returned,
    Failed(String, FeatureError),
    Abandoned,
}

/// Drives a built [`Registry`] through startup, serving and shutdown. Runs once.
#[derive(Debug)]
pub struct Runner {
    slots: Vec<Slot>,
    bindings: Bindings,
    stop: StopHandle,
    state: watch::Sender<LifecycleState>,
    config: RunnerConfig,
}

impl Runner {
    pub(crate) fn new(registry: Registry, config: RunnerConfig) -> Self {
        let Registry { slots, bindings, stop, state } = registry;
        Self { slots, bindings, stop, state, config }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observes state changes; `Running` doubles as the readiness signal.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleWatch {
        LifecycleWatch::new(self.state.subscribe())
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs until Ctrl+C / SIGTERM, the server loop returns, or a
    /// [`StopHandle`] fires.
    ///
    /// # Errors
    /// * [`LifecycleError::Startup`] after rolling back the started features.
    /// * [`LifecycleError::Shutdown`] when any `on_shutdown` failed or timed out.
    /// * [`LifecycleError::Serve`] when the server loop failed and shutdown was clean.
    pub async fn run(self) -> Result<RunReport, LifecycleError> {
        self.run_on_signal(shutdown_signal()).await
    }

    /// Like [`run`](Self::run), with `signal` standing in for the process
    /// signal listener. `Ok` stops with [`StopReason::Signal`]; `Err` is logged
    /// and the runner keeps going until another trigger fires.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub async fn run_on_signal<F>(self, signal: F) -> Result<RunReport, LifecycleError>
    where
        F: Future<Output = io::Result<()>> + Send,
    {
        let stop = self.stop.clone();
        self.run_with(async move {
            match signal.await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    stop.stop(StopReason::Signal);
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for shutdown signals");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Like [`run`](Self::run), but stops with [`StopReason::Requested`] when
    /// `trigger` resolves instead of listening for process signals.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub async fn run_until<F>(self, trigger: F) -> Result<RunReport, LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        let stop = self.stop.clone();
        self.run_with(async move {
            trigger.await;
            stop.stop(StopReason::Requested);
        })
        .await
    }

    async fn run_with<F>(self, trigger: F) -> Result<RunReport, LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        let drive = self.drive();
        tokio::pin!(drive, trigger);

        tokio::select! {
            res = &mut drive => return res,
            () = &mut trigger => {}
        }

        drive.await
    }

    async fn drive(mut self) -> Result<RunReport, LifecycleError> {
        self.set_state(LifecycleState::Starting);
        info!(features = self.slots.len(), "Starting features");

        let mut started = 0;
        let mut interrupted = false;
        for index in 0..self.slots.len() {
            if self.stop.is_stopped() {
                interrupted = true;
                break;
            }

            let Slot { name, feature, tasks } = &mut self.slots[index];
            debug!(feature = %name, "Starting feature");
            let result = {
                let mut ctx = FeatureContext::new(
                    name,
                    Phase::Startup,
                    &mut self.bindings,
                    Some(tasks),
                    &self.stop,
                    LifecycleWatch::new(self.state.subscribe()),
                );
                feature.on_startup(&mut ctx).await
            };

            if let Err(source) = result {
                error!(feature = %name, error = %source, "Feature failed to start, rolling back");
                let feature = name.clone();
                tasks.shutdown().await;

                self.set_state(LifecycleState::ShuttingDown);
                let failures = self.shutdown(started).await;
                if !failures.is_empty() {
                    warn!(failures = failures.len(), "Rollback finished with shutdown failures");
                }
                self.set_state(LifecycleState::Stopped);
                return Err(LifecycleError::Startup { feature, source, context: None });
            }

            started += 1;
            info!(feature = %name, "Feature started");
        }
        interrupted |= self.stop.is_stopped();

        let mut serve_end = ServeEnd::Idle;
        if interrupted {
            warn!(started, total = self.slots.len(), "Stop requested during startup");
        } else {
            self.set_state(LifecycleState::Running);
            info!(features = started, "All features started");
            serve_end = self.serve().await;
        }

        let reason = self.stop.reason().unwrap_or(StopReason::ServerExited);
        self.set_state(LifecycleState::ShuttingDown);
        info!(%reason, "Shutting down features");

        let failures = self.shutdown(started).await;
        self.set_state(LifecycleState::Stopped);

        if !failures.is_empty() {
            return Err(LifecycleError::Shutdown { failures, context: None });
        }
        let server_abandoned = match serve_end {
            ServeEnd::Failed(feature, source) => {
                return Err(LifecycleError::Serve { feature, source, context: None });
            }
            ServeEnd::Abandoned => true,
            ServeEnd::Idle | ServeEnd::Returned => false,
        };

        info!(server_abandoned, "All features stopped");
        Ok(RunReport { reason, interrupted, started, server_abandoned })
    }

    /// Serving phase.
    async fn serve(&mut self) -> ServeEnd {
        let grace = self.config.serve_grace;
        let mut stop_signal = self.stop.signal();

        let Some(Slot { name, feature, .. }) = self.slots.iter_mut().find(|slot| slot.feature.is_server())
        else {
            let reason = stop_signal.wait().await;
            debug!(%reason, "Stop trigger received");
            return ServeEnd::Idle;
        };

        info!(feature = %name, "Entering server loop");
        let mut serve = feature.serve(self.stop.signal());
        let outcome = tokio::select! {
            res = &mut serve => Some(res),
            reason = stop_signal.wait() => {
                debug!(%reason, ?grace, "Waiting for server loop to drain");
                if let Ok(res) = time::timeout(grace, &mut serve).await {
                    Some(res)
                } else {
                    warn!(feature = %name, ?grace, "Server loop did not return in time, dropping it");
                    None
                }
            }
        };
        drop(serve);

        match outcome {
            Some(Ok(())) => {
                self.stop.stop(StopReason::ServerExited);
                ServeEnd::Returned
            }
            Some(Err(e)) => {
                error!(feature = %name, error = %e, "Server loop failed");
                self.stop.stop(StopReason::ServerExited);
                ServeEnd::Failed(name.clone(), e)
            }
            None => ServeEnd::Abandoned,
        }
    }

    /// Calls `on_shutdown` on the first `count` features in reverse order.
    async fn shutdown(&mut self, count: usize) -> Vec<ShutdownFailure> {
        let mut failures = Vec::new();

        for Slot { name, feature, tasks } in self.slots[..count].iter_mut().rev() {
            let timeout = feature.shutdown_timeout().unwrap_or(self.config.shutdown_timeout);
            debug!(feature = %name, ?timeout, "Stopping feature");

            let result = {
                let mut ctx = FeatureContext::new(
                    name,
                    Phase::Shutdown,
                    &mut self.bindings,
                    None,
                    &self.stop,
                    LifecycleWatch::new(self.state.subscribe()),
                );
                time::timeout(timeout, feature.on_shutdown(&mut ctx)).await
            };

            match result {
                Ok(Ok(())) => info!(feature = %name, "Feature stopped"),
                Ok(Err(e)) => {
                    error!(feature = %name, error = %e, "Feature failed to shut down");
                    failures.push(ShutdownFailure { feature: name.clone(), cause: ShutdownCause::Failed(e) });
                }
                Err(_) => {
                    error!(feature = %name, ?timeout, "Feature shutdown timed out");
                    failures.push(ShutdownFailure { feature: name.clone(), cause: ShutdownCause::TimedOut(timeout) });
                }
            }

            tasks.shutdown().await;
        }

        failures
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        debug!(from = %previous, to = %state, "Lifecycle transition");
    }
}
