//! # Access log feature
//!
//! Emits one `info` event per HTTP request on the [`TARGET`] target, with the
//! client IP, user agent, request line, status code, referer and latency as
//! fields. The client IP is `-` when the server does not provide connection
//! info.
//!
//! Must be registered after `http_app`. Registered after `request_id`, each
//! event lands inside that request's span.
//!
//! ```yaml
//! access_log:
//!   log_msg: HTTP Request
//!   exclude_paths: [/health]
//! ```

mod middleware;

pub use crate::middleware::TARGET;

use crate::middleware::{Settings, access_log_middleware};
use fhub_http_app::APP;
use fhub_kernel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Section and feature name.
pub const NAME: &str = "access_log";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConfig {
    /// Message of every access event.
    pub log_msg: String,
    /// Exact paths that are served without an access event.
    pub exclude_paths: Vec<String>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self { log_msg: "HTTP Request".to_owned(), exclude_paths: Vec::new() }
    }
}

#[derive(Debug, Default)]
pub struct AccessLogFeature {
    config: AccessLogConfig,
}

impl AccessLogFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn config(&self) -> &AccessLogConfig {
        &self.config
    }
}

#[async_trait]
impl Feature for AccessLogFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        let config: AccessLogConfig = section.parse_or_default()?;
        if config.log_msg.trim().is_empty() {
            return Err(FeatureError::config("log_msg must not be empty"));
        }
        if let Some(path) = config.exclude_paths.iter().find(|path| !path.starts_with('/')) {
            return Err(FeatureError::config(format!("exclude_paths entry '{path}' must start with '/'")));
        }
        self.config = config;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let app = ctx.lookup(APP).context("access_log must be registered after http_app")?;

        let settings = Arc::new(Settings {
            message: self.config.log_msg.clone(),
            exclude_paths: self.config.exclude_paths.clone(),
        });
        app.layer(move |router| router.layer(axum::middleware::from_fn_with_state(settings, access_log_middleware)))?;

        debug!(excluded = self.config.exclude_paths.len(), "Access log middleware registered");
        Ok(())
    }
}
