//! # Logging feature
//!
//! Installs the process-wide `tracing` subscriber from the `logging`
//! configuration section during `init`, so every later feature logs through
//! it. The file writer guard is held until `on_shutdown` flushes it.
//!
//! ```yaml
//! logging:
//!   level: debug
//!   env_filter: "fhub_kernel=trace,hyper=info"
//!   json: false
//!   path: ./logs
//!   rotation: daily
//!   max_files: 7
//! ```

use fhub_kernel::prelude::*;
use fhub_logger::{LevelFilter, Logger, LoggerError, Rotation, parse_rotation};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Section and feature name.
pub const NAME: &str = "logging";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logger name, used as the log file prefix.
    pub name: String,
    pub level: String,
    /// Filter directives; `RUST_LOG` is used when unset.
    pub env_filter: Option<String>,
    pub console: bool,
    /// Console records as JSON lines.
    pub json: bool,
    /// Directory of the rolling file output. No file output when unset.
    pub path: Option<PathBuf>,
    pub file_json: bool,
    pub rotation: String,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            name: "fhub".to_owned(),
            level: "info".to_owned(),
            env_filter: None,
            console: true,
            json: false,
            path: None,
            file_json: false,
            rotation: "daily".to_owned(),
            max_files: 10,
        }
    }
}

/// Installs and owns the global subscriber.
#[derive(Debug)]
pub struct LoggingFeature {
    config: LoggingConfig,
    level: LevelFilter,
    rotation: Rotation,
    logger: Option<Logger>,
}

impl Default for LoggingFeature {
    fn default() -> Self {
        Self {
            config: LoggingConfig::default(),
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            logger: None,
        }
    }
}

impl LoggingFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration used when the document has no `logging` section.
    #[must_use]
    pub fn with_defaults(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Whether this feature owns the installed subscriber.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.logger.is_some()
    }

    fn validate(&mut self) -> Result<(), FeatureError> {
        let config = &self.config;
        if config.name.trim().is_empty() {
            return Err(FeatureError::config("logger name cannot be empty"));
        }
        self.level = config
            .level
            .parse::<LevelFilter>()
            .map_err(|e| FeatureError::config(format!("invalid level '{}': {e}", config.level)))?;
        self.rotation = parse_rotation(&config.rotation).map_err(|e| FeatureError::config(e.to_string()))?;
        if config.path.is_some() && config.max_files == 0 {
            return Err(FeatureError::config("max_files must be greater than zero"));
        }
        if !config.console && config.path.is_none() {
            return Err(FeatureError::config("enable console output or set a log path"));
        }
        Ok(())
    }

    fn install(&self) -> Result<Logger, LoggerError> {
        let config = &self.config;
        let mut builder = Logger::builder()
            .name(config.name.as_str())
            .level(self.level)
            .console(config.console)
            .console_json(config.json)
            .file_json(config.file_json)
            .max_files(config.max_files)
            .rotation(self.rotation.clone());
        if let Some(filter) = &config.env_filter {
            builder = builder.env_filter(filter.as_str());
        }
        if let Some(path) = &config.path {
            builder = builder.path(path.clone());
        }
        builder.init()
    }
}

#[async_trait]
impl Feature for LoggingFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        if let Some(config) = section.parse::<LoggingConfig>()? {
            self.config = config;
        }
        self.validate()
    }

    fn init(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        match self.install() {
            Ok(logger) => {
                info!(level = %self.level, file = self.config.path.is_some(), "Logging initialized");
                self.logger = Some(logger);
                Ok(())
            }
            // A host or test harness installed its own subscriber first.
            Err(LoggerError::Subscriber { source, .. }) => {
                debug!(error = %source, "Global subscriber already installed, keeping it");
                Ok(())
            }
            Err(e) => Err(FeatureError::other(e)),
        }
    }

    async fn on_shutdown(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        if let Some(logger) = self.logger.take() {
            logger.flush();
        }
        Ok(())
    }
}
