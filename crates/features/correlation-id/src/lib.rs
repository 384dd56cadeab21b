//! # Correlation ID feature
//!
//! Tags every HTTP request with a correlation ID that follows one logical
//! operation across services. The ID comes from the incoming header when
//! `accept_external` is set and the value is well formed, otherwise from the
//! request's [`RequestId`](fhub_request_id::RequestId) when
//! `set_from_request_id` is set, otherwise it is generated. It is written back
//! onto the request headers, stored as a [`CorrelationId`] extension and made
//! available through [`current_correlation_id`].
//!
//! Must be registered after `http_app`, and after `request_id` when seeding
//! from the request ID.
//!
//! ```yaml
//! correlation_id:
//!   accept_external: true
//!   set_on_response: true
//! ```

mod middleware;

pub use crate::middleware::{
    CorrelationId, current_correlation_id, require_correlation_id, with_correlation_id,
};

use crate::middleware::{Settings, correlation_id_middleware};
use axum::http::HeaderName;
use fhub_http_app::APP;
use fhub_kernel::prelude::*;
use fhub_request_id::REQUEST_ID_HEADER;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Section and feature name.
pub const NAME: &str = "correlation_id";

/// Header carrying the ID, published during `init` when the feature is active.
pub const CORRELATION_ID_HEADER: BindingKey<HeaderName> = BindingKey::new("correlation_id_header");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationIdConfig {
    /// Master switch; the other flags need it.
    pub set_on_request: bool,
    /// Reuse the request ID instead of generating a new value.
    pub set_from_request_id: bool,
    pub header_name: String,
    /// Trust a well-formed ID sent by the client.
    pub accept_external: bool,
    pub set_on_response: bool,
}

impl Default for CorrelationIdConfig {
    fn default() -> Self {
        Self {
            set_on_request: true,
            set_from_request_id: true,
            header_name: "X-Correlation-ID".to_owned(),
            accept_external: false,
            set_on_response: false,
        }
    }
}

impl CorrelationIdConfig {
    /// Rejects flag combinations that have no effect.
    ///
    /// # Errors
    /// [`FeatureError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<HeaderName, FeatureError> {
        if !self.set_on_request {
            for (flag, set) in [
                ("set_from_request_id", self.set_from_request_id),
                ("accept_external", self.accept_external),
                ("set_on_response", self.set_on_response),
            ] {
                if set {
                    return Err(FeatureError::config(format!("{flag} requires set_on_request")));
                }
            }
        }
        HeaderName::from_bytes(self.header_name.trim().to_ascii_lowercase().as_bytes()).map_err(|e| {
            FeatureError::config(format!("invalid header_name '{}': {e}", self.header_name))
        })
    }
}

#[derive(Debug, Default)]
pub struct CorrelationIdFeature {
    config: CorrelationIdConfig,
    header: Option<HeaderName>,
}

impl CorrelationIdFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn config(&self) -> &CorrelationIdConfig {
        &self.config
    }
}

#[async_trait]
impl Feature for CorrelationIdFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        let config: CorrelationIdConfig = section.parse_or_default()?;
        self.header = Some(config.validate()?);
        self.config = config;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        if !self.config.set_on_request {
            debug!("Correlation IDs disabled");
            return Ok(());
        }
        let app = ctx.lookup(APP).context("correlation_id must be registered after http_app")?;
        let header = self.header.clone().map_or_else(|| self.config.validate(), Ok)?;

        if self.config.set_from_request_id {
            let request_header = ctx
                .lookup(REQUEST_ID_HEADER)
                .context("correlation_id seeded from request IDs must be registered after request_id")?;
            if *request_header == header {
                return Err(FeatureError::config(format!(
                    "header_name '{header}' is already used for request IDs"
                )));
            }
        }

        let settings = Arc::new(Settings {
            header: header.clone(),
            accept_external: self.config.accept_external,
            from_request_id: self.config.set_from_request_id,
            set_on_response: self.config.set_on_response,
        });
        app.layer(move |router| {
            router.layer(axum::middleware::from_fn_with_state(settings, correlation_id_middleware))
        })?;

        debug!(
            header = %header,
            from_request_id = self.config.set_from_request_id,
            accept_external = self.config.accept_external,
            "Correlation ID middleware registered"
        );
        ctx.publish(CORRELATION_ID_HEADER, header)?;
        Ok(())
    }
}
