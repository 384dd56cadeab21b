use crate::context::FeatureContext;
use crate::error::FeatureError;
use crate::lifecycle::StopSignal;
use async_trait::async_trait;
use fhub_domain::config::ConfigSection;
use std::any::Any;
use std::time::Duration;

/// Whether a feature can run without its configuration section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigRequirement {
    /// A missing section fails the registry build before `bind_config` is called.
    Required,
    /// The feature receives [`ConfigSection::Absent`] and picks its defaults.
    #[default]
    Optional,
}

/// A self-contained capability driven through the lifecycle.
///
/// Hooks are called in this order, each for every feature before the next
/// hook starts: `bind_config`, `init`, `on_startup`, then (after serving)
/// `on_shutdown` in reverse registration order.
///
/// ```rust
/// use fhub_kernel::prelude::*;
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// #[async_trait]
/// impl Feature for Greeter {
///     fn name(&self) -> &str {
///         "greeter"
///     }
///
///     fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
///         if let Some(greeting) = section.parse::<String>()? {
///             self.greeting = greeting;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Feature: Any + Send {
    /// Unique identity and configuration key.
    fn name(&self) -> &str;

    fn config_requirement(&self) -> ConfigRequirement {
        ConfigRequirement::Optional
    }

    /// Parses the feature's section into its typed configuration.
    ///
    /// # Errors
    /// Schema mismatches, reported as a configuration validation failure.
    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        let _ = section;
        Ok(())
    }

    /// Synchronous setup. Must not block on I/O.
    ///
    /// # Errors
    /// Any failure aborts the registry build.
    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let _ = ctx;
        Ok(())
    }

    /// I/O-bound setup.
    ///
    /// # Errors
    /// Any failure rolls back the features started before this one.
    async fn on_startup(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let _ = ctx;
        Ok(())
    }

    /// Releases resources. Called even if `on_startup` never ran to completion
    /// for a later feature, so it must tolerate partial setup.
    ///
    /// # Errors
    /// Collected into the shutdown report; never stops the sweep.
    async fn on_shutdown(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let _ = ctx;
        Ok(())
    }

    /// Marks the single feature whose [`serve`](Self::serve) loop runs while `Running`.
    fn is_server(&self) -> bool {
        false
    }

    /// Server loop. Must return soon after `stop` resolves.
    ///
    /// # Errors
    /// A failure ends the serving phase and is reported once shutdown completes.
    async fn serve(&mut self, stop: StopSignal) -> Result<(), FeatureError> {
        let _ = stop;
        Err(FeatureError::unavailable(format!("'{}' has no server loop", self.name())))
    }

    /// Overrides the runner-wide bound on this feature's `on_shutdown`.
    fn shutdown_timeout(&self) -> Option<Duration> {
        None
    }
}
