//! Facade crate for `FeatureHub` features and shared modules.
//! Re-exports domain/kernel primitives and composes features into a runnable application.
//! Keep this crate thin: it should compose other crates, not implement business logic.
//!
//! ## Usage
//! - Add `fhub` with the desired feature flags (`http`, `tls`).
//! - Build an [`Application`] from features and an [`AppConfig`](domain::config::AppConfig),
//!   then `run()` the returned runner.
//!
//! ```no_run
//! use fhub::Application;
//! use fhub::kernel::config::load_app_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_app_config("server.yaml")?;
//! let report = Application::builder()
//!     .features(fhub::features::http_stack())
//!     .config(config)
//!     .build()?
//!     .run()
//!     .await?;
//! println!("stopped: {}", report.reason);
//! # Ok(())
//! # }
//! ```

pub use fhub_domain as domain;
pub use fhub_kernel as kernel;

use fhub_domain::config::{AppConfig, ConfigDocument, LifecycleConfig};
use fhub_kernel::prelude::{Feature, Registry, RegistryError, Runner, RunnerConfig};
use fhub_logging::LoggingFeature;
use std::fmt;
use tracing::debug;

/// Feature crates bundled with the facade.
pub mod features {
    pub use fhub_constants as constants;
    pub use fhub_logging as logging;

    #[cfg(feature = "http")]
    pub use fhub_access_log as access_log;
    #[cfg(feature = "http")]
    pub use fhub_correlation_id as correlation_id;
    #[cfg(feature = "http")]
    pub use fhub_http_app as http_app;
    #[cfg(feature = "http")]
    pub use fhub_http_server as http_server;
    #[cfg(feature = "http")]
    pub use fhub_request_id as request_id;

    use fhub_kernel::prelude::Feature;

    /// Build-time enabled features (by Cargo feature).
    pub const ENABLED: &[&str] = &[
        logging::NAME,
        constants::NAME,
        #[cfg(feature = "http")]
        http_app::NAME,
        #[cfg(feature = "http")]
        request_id::NAME,
        #[cfg(feature = "http")]
        correlation_id::NAME,
        #[cfg(feature = "http")]
        access_log::NAME,
        #[cfg(feature = "http")]
        http_server::NAME,
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }

    /// The web service stack in registration order: router, request and
    /// correlation IDs, access log, constants, then the server, which must
    /// come last.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn http_stack() -> Vec<Box<dyn Feature>> {
        vec![
            Box::new(http_app::HttpAppFeature::new()),
            Box::new(request_id::RequestIdFeature::new()),
            Box::new(correlation_id::CorrelationIdFeature::new()),
            Box::new(access_log::AccessLogFeature::new()),
            Box::new(constants::ConstantsFeature::new()),
            Box::new(http_server::HttpServerFeature::new()),
        ]
    }
}

/// Entry point for composing an application.
#[derive(Debug)]
pub struct Application;

impl Application {
    /// Returns a new [`ApplicationBuilder`].
    #[must_use = "builders do nothing unless you call .build()"]
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder { features: Vec::new(), config: AppConfig::default(), default_logging: true }
    }
}

/// Collects features and configuration, then builds the registry.
///
/// A [`LoggingFeature`] is placed first unless a feature named `logging` is
/// registered or [`without_default_logging`](Self::without_default_logging)
/// is called, so every later hook logs through the configured subscriber.
#[must_use = "builders do nothing unless you call .build()"]
pub struct ApplicationBuilder {
    features: Vec<Box<dyn Feature>>,
    config: AppConfig,
    default_logging: bool,
}

impl ApplicationBuilder {
    /// Registers a feature. Registration order is startup order.
    pub fn feature<F: Feature>(mut self, feature: F) -> Self {
        self.features.push(Box::new(feature));
        self
    }

    pub fn boxed(mut self, feature: Box<dyn Feature>) -> Self {
        self.features.push(feature);
        self
    }

    pub fn features<I>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Feature>>,
    {
        self.features.extend(features);
        self
    }

    /// Replaces the whole configuration: lifecycle knobs and feature sections.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces only the feature sections.
    pub fn document(mut self, document: ConfigDocument) -> Self {
        self.config.features = document;
        self
    }

    pub const fn lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.config.lifecycle = lifecycle;
        self
    }

    /// Leaves subscriber setup to the caller.
    pub const fn without_default_logging(mut self) -> Self {
        self.default_logging = false;
        self
    }

    /// Binds configuration and runs every `init`.
    ///
    /// # Errors
    /// See [`Registry::build`].
    pub fn build_registry(self) -> Result<(Registry, RunnerConfig), RegistryError> {
        let Self { mut features, config, default_logging } = self;

        if default_logging && !features.iter().any(|f| f.name() == fhub_logging::NAME) {
            debug!("Registering default logging feature");
            features.insert(0, Box::new(LoggingFeature::new()));
        }

        let registry = Registry::build(features, &config.features)?;
        Ok((registry, RunnerConfig::from(&config.lifecycle)))
    }

    /// Builds the registry and hands it to a [`Runner`] configured from the
    /// lifecycle section.
    ///
    /// # Errors
    /// See [`Registry::build`].
    pub fn build(self) -> Result<Runner, RegistryError> {
        let (registry, runner_config) = self.build_registry()?;
        Ok(registry.into_runner(runner_config))
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("features", &self.features.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .field("default_logging", &self.default_logging)
            .finish()
    }
}
