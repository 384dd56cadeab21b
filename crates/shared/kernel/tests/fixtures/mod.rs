#![allow(dead_code)]

use fhub_kernel::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const GREETING: BindingKey<String> = BindingKey::new("greeting");

/// Ordered record of every hook call across all recorders of a test.
#[derive(Debug, Default)]
pub struct Journal {
    calls: Mutex<Vec<String>>,
    sections: Mutex<Vec<(String, ConfigSection)>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn sections(&self) -> Vec<(String, ConfigSection)> {
        self.sections.lock().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().push(entry);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BindConfig,
    Init,
    Startup,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    UntilStop,
    ReturnAtOnce,
    Fail,
    IgnoreStop,
}

/// Records a journal entry when the owning task is dropped.
struct DropRecord(Arc<Journal>, String);

impl Drop for DropRecord {
    fn drop(&mut self) {
        self.0.record(format!("{}.task_dropped", self.1));
    }
}

/// Configurable feature that journals every hook it receives.
pub struct Recorder {
    name: String,
    journal: Arc<Journal>,
    fail: Vec<Hook>,
    required: bool,
    shutdown_delay: Option<Duration>,
    timeout_override: Option<Duration>,
    publishes: Option<Phase>,
    consumes: Option<Phase>,
    seen: Option<String>,
    serve: Option<ServeMode>,
    stop_during_startup: bool,
    idle_task: bool,
    failing_critical_task: bool,
    spawn_in_init: bool,
}

impl Recorder {
    pub fn new(name: &str, journal: &Arc<Journal>) -> Self {
        Self {
            name: name.to_owned(),
            journal: Arc::clone(journal),
            fail: Vec::new(),
            required: false,
            shutdown_delay: None,
            timeout_override: None,
            publishes: None,
            consumes: None,
            seen: None,
            serve: None,
            stop_during_startup: false,
            idle_task: false,
            failing_critical_task: false,
            spawn_in_init: false,
        }
    }

    pub fn failing(mut self, hook: Hook) -> Self {
        self.fail.push(hook);
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn slow_shutdown(mut self, delay: Duration) -> Self {
        self.shutdown_delay = Some(delay);
        self
    }

    pub const fn shutdown_timeout_override(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    pub const fn publishing(mut self, phase: Phase) -> Self {
        self.publishes = Some(phase);
        self
    }

    pub const fn consuming(mut self, phase: Phase) -> Self {
        self.consumes = Some(phase);
        self
    }

    pub const fn serving(mut self, mode: ServeMode) -> Self {
        self.serve = Some(mode);
        self
    }

    pub const fn stopping_during_startup(mut self) -> Self {
        self.stop_during_startup = true;
        self
    }

    pub const fn with_idle_task(mut self) -> Self {
        self.idle_task = true;
        self
    }

    pub const fn with_failing_critical_task(mut self) -> Self {
        self.failing_critical_task = true;
        self
    }

    pub const fn spawning_in_init(mut self) -> Self {
        self.spawn_in_init = true;
        self
    }

    pub fn boxed(self) -> Box<dyn Feature> {
        Box::new(self)
    }

    /// Binding value observed by a consuming recorder.
    pub fn seen(&self) -> Option<&str> {
        self.seen.as_deref()
    }

    fn enter(&self, hook: &str) {
        self.journal.record(format!("{}.{hook}", self.name));
    }

    fn outcome(&self, hook: Hook) -> Result<(), FeatureError> {
        if self.fail.contains(&hook) {
            return Err(FeatureError::Internal {
                message: format!("{} failed in {hook:?}", self.name).into(),
                context: None,
            });
        }
        Ok(())
    }

    fn exchange_bindings(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        if self.publishes == Some(ctx.phase()) {
            ctx.publish(GREETING, format!("hello from {}", self.name))?;
        }
        if self.consumes == Some(ctx.phase()) {
            self.seen = Some(ctx.lookup(GREETING)?.as_str().to_owned());
        }
        Ok(())
    }
}

#[async_trait]
impl Feature for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn config_requirement(&self) -> ConfigRequirement {
        if self.required { ConfigRequirement::Required } else { ConfigRequirement::Optional }
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        self.journal.sections.lock().push((self.name.clone(), section));
        self.outcome(Hook::BindConfig)
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.enter("init");
        self.exchange_bindings(ctx)?;
        if self.spawn_in_init {
            ctx.spawn("too-early", async { Ok(()) })?;
        }
        self.outcome(Hook::Init)
    }

    async fn on_startup(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.enter("on_startup");
        self.exchange_bindings(ctx)?;

        if self.idle_task {
            let guard = DropRecord(Arc::clone(&self.journal), self.name.clone());
            ctx.spawn("idle", async move {
                let _guard = guard;
                std::future::pending::<Result<(), FeatureError>>().await
            })?;
        }
        if self.failing_critical_task {
            ctx.spawn_critical("ticker", async { Err(FeatureError::from("tick failed")) })?;
        }
        if self.stop_during_startup {
            ctx.stop_handle().stop(StopReason::Requested);
        }
        self.outcome(Hook::Startup)
    }

    async fn on_shutdown(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.enter("on_shutdown");
        if let Some(delay) = self.shutdown_delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome(Hook::Shutdown)
    }

    fn is_server(&self) -> bool {
        self.serve.is_some()
    }

    async fn serve(&mut self, mut stop: StopSignal) -> Result<(), FeatureError> {
        self.enter("serve");
        match self.serve {
            Some(ServeMode::UntilStop) => {
                stop.wait().await;
                Ok(())
            }
            Some(ServeMode::ReturnAtOnce) => Ok(()),
            Some(ServeMode::Fail) => Err(FeatureError::from("listener closed")),
            Some(ServeMode::IgnoreStop) => std::future::pending().await,
            None => Err(FeatureError::unavailable("not a server")),
        }
    }

    fn shutdown_timeout(&self) -> Option<Duration> {
        self.timeout_override
    }
}

/// Names a list of recorders `A`, `B`, ... sharing one journal.
pub fn recorders(names: &[&str], journal: &Arc<Journal>) -> Vec<Recorder> {
    names.iter().map(|name| Recorder::new(name, journal)).collect()
}

pub fn boxed(recorders: Vec<Recorder>) -> Vec<Box<dyn Feature>> {
    recorders.into_iter().map(Recorder::boxed).collect()
}

pub fn fast_runner_config() -> RunnerConfig {
    RunnerConfig::default()
        .with_shutdown_timeout(Duration::from_millis(200))
        .with_serve_grace(Duration::from_millis(50))
}
