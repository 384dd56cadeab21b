use crate::binding::{BindingKey, Bindings};
use crate::error::FeatureError;
use crate::lifecycle::{LifecycleWatch, StopHandle, StopReason};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Hook a [`FeatureContext`] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Startup,
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Startup => "on_startup",
            Self::Shutdown => "on_shutdown",
        })
    }
}

/// What a feature hook may touch besides the feature itself.
#[derive(Debug)]
pub struct FeatureContext<'a> {
    feature: &'a str,
    phase: Phase,
    bindings: &'a mut Bindings,
    tasks: Option<&'a mut JoinSet<()>>,
    stop: &'a StopHandle,
    lifecycle: LifecycleWatch,
}

impl<'a> FeatureContext<'a> {
    pub(crate) const fn new(
        feature: &'a str,
        phase: Phase,
        bindings: &'a mut Bindings,
        tasks: Option<&'a mut JoinSet<()>>,
        stop: &'a StopHandle,
        lifecycle: LifecycleWatch,
    ) -> Self {
        Self { feature, phase, bindings, tasks, stop, lifecycle }
    }

    /// Name of the feature the hook runs for.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.feature
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Publishes `value` under `key`, owned by the current feature.
    ///
    /// # Errors
    /// [`FeatureError::BindingConflict`] if the key is already published.
    pub fn publish<T: Any + Send + Sync>(&mut self, key: BindingKey<T>, value: T) -> Result<Arc<T>, FeatureError> {
        self.bindings.publish(self.feature, key, value)
    }

    /// Looks up a binding published by an earlier feature.
    ///
    /// # Errors
    /// [`FeatureError::BindingNotFound`] or [`FeatureError::BindingType`].
    pub fn lookup<T: Any + Send + Sync>(&self, key: BindingKey<T>) -> Result<Arc<T>, FeatureError> {
        self.bindings.get(key)
    }

    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        self.bindings
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleWatch {
        self.lifecycle.clone()
    }

    /// Runs `task` in the background until it returns or the feature is shut down.
    /// Errors are logged.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] outside of `on_startup`.
    pub fn spawn<F>(&mut self, task: impl Into<String>, fut: F) -> Result<(), FeatureError>
    where
        F: Future<Output = Result<(), FeatureError>> + Send + 'static,
    {
        self.spawn_task(task.into(), fut, false)
    }

    /// Like [`spawn`](Self::spawn), but an error stops the whole runner with
    /// [`StopReason::TaskFailed`].
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] outside of `on_startup`.
    pub fn spawn_critical<F>(&mut self, task: impl Into<String>, fut: F) -> Result<(), FeatureError>
    where
        F: Future<Output = Result<(), FeatureError>> + Send + 'static,
    {
        self.spawn_task(task.into(), fut, true)
    }

    fn spawn_task<F>(&mut self, task: String, fut: F, critical: bool) -> Result<(), FeatureError>
    where
        F: Future<Output = Result<(), FeatureError>> + Send + 'static,
    {
        let Some(tasks) = self.tasks.as_deref_mut() else {
            return Err(FeatureError::unavailable(format!(
                "'{}' cannot spawn '{task}' during {}",
                self.feature, self.phase
            )));
        };

        let feature = self.feature.to_owned();
        let stop = self.stop.clone();
        debug!(feature = %feature, task = %task, critical, "Spawning background task");

        tasks.spawn(async move {
            match fut.await {
                Ok(()) => debug!(feature = %feature, task = %task, "Background task finished"),
                Err(e) if critical => {
                    error!(feature = %feature, task = %task, error = %e, "Critical background task failed");
                    stop.stop(StopReason::TaskFailed { feature, task });
                }
                Err(e) => warn!(feature = %feature, task = %task, error = %e, "Background task failed"),
            }
        });
        Ok(())
    }
}
