//! # HTTP application feature
//!
//! Creates the process's `axum` [`Router`](axum::Router) during `init` and
//! publishes it as an [`HttpApp`] under [`APP`]. Features registered later
//! contribute routes and middleware; the server feature takes the finished
//! router when it starts.
//!
//! ```yaml
//! http_app:
//!   health_path: /health
//!   trace: true
//! ```

mod app;
mod health;

pub use crate::app::HttpApp;

use axum::Router;
use axum::routing::get;
use fhub_kernel::prelude::*;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Section and feature name.
pub const NAME: &str = "http_app";

/// Binding holding the shared router handle.
pub const APP: BindingKey<HttpApp> = BindingKey::new("app");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpAppConfig {
    /// Serves the health endpoint when `true`.
    pub health: bool,
    pub health_path: String,
    /// Wraps every route in a `tower-http` trace span.
    pub trace: bool,
}

impl Default for HttpAppConfig {
    fn default() -> Self {
        Self { health: true, health_path: "/health".to_owned(), trace: true }
    }
}

#[derive(Debug, Default)]
pub struct HttpAppFeature {
    config: HttpAppConfig,
    app: Option<Arc<HttpApp>>,
}

impl HttpAppFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The published handle; `None` before `init`.
    #[must_use]
    pub fn app(&self) -> Option<Arc<HttpApp>> {
        self.app.clone()
    }
}

#[async_trait]
impl Feature for HttpAppFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        let config: HttpAppConfig = section.parse_or_default()?;
        if config.health && !config.health_path.starts_with('/') {
            return Err(FeatureError::config(format!(
                "health_path must start with '/', got '{}'",
                config.health_path
            )));
        }
        self.config = config;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let mut router = Router::new();
        if self.config.health {
            LazyLock::force(&health::STARTED_AT);
            let health = get(health::health_handler).with_state(ctx.lifecycle());
            router = router.route(&self.config.health_path, health);
        }
        debug!(health = self.config.health, trace = self.config.trace, "Publishing application router");
        self.app = Some(ctx.publish(APP, HttpApp::new(router, self.config.trace))?);
        Ok(())
    }

    async fn on_shutdown(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.app = None;
        Ok(())
    }
}
