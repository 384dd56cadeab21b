//! # Request ID feature
//!
//! Gives every HTTP request an identifier: generated per request, or taken
//! from the incoming header when `accept_external` is set. The ID is written
//! back onto the request headers, stored as a [`RequestId`] extension, made
//! available through [`current_request_id`], added to a `request` tracing
//! span and echoed on the response.
//!
//! Must be registered after `http_app`.
//!
//! ```yaml
//! request_id:
//!   accept_external: true
//!   header_name: X-Correlation-ID
//! ```

mod middleware;

pub use crate::middleware::{RequestId, current_request_id, is_well_formed_id};

use crate::middleware::{Settings, request_id_middleware};
use axum::http::HeaderName;
use fhub_http_app::APP;
use fhub_kernel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Section and feature name.
pub const NAME: &str = "request_id";

/// Header carrying the ID, published during `init` when the feature is active.
pub const REQUEST_ID_HEADER: BindingKey<HeaderName> = BindingKey::new("request_id_header");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestIdConfig {
    /// Master switch; the other flags need it.
    pub set_on_request: bool,
    /// Trust a well-formed ID sent by the client instead of generating one.
    pub accept_external: bool,
    pub set_on_response: bool,
    pub header_name: String,
    /// Opens a `request` span with a `request_id` field around the handler.
    pub add_to_span: bool,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            set_on_request: true,
            accept_external: false,
            set_on_response: true,
            header_name: "X-Request-ID".to_owned(),
            add_to_span: true,
        }
    }
}

impl RequestIdConfig {
    /// Rejects flag combinations that have no effect.
    ///
    /// # Errors
    /// [`FeatureError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<HeaderName, FeatureError> {
        if !self.set_on_request {
            if self.set_on_response {
                return Err(FeatureError::config("set_on_response requires set_on_request"));
            }
            if self.accept_external {
                return Err(FeatureError::config("accept_external requires set_on_request"));
            }
        }
        HeaderName::from_bytes(self.header_name.trim().to_ascii_lowercase().as_bytes()).map_err(|e| {
            FeatureError::config(format!("invalid header_name '{}': {e}", self.header_name))
        })
    }
}

#[derive(Debug, Default)]
pub struct RequestIdFeature {
    config: RequestIdConfig,
    header: Option<HeaderName>,
}

impl RequestIdFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn config(&self) -> &RequestIdConfig {
        &self.config
    }
}

#[async_trait]
impl Feature for RequestIdFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        let config: RequestIdConfig = section.parse_or_default()?;
        self.header = Some(config.validate()?);
        self.config = config;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        if !self.config.set_on_request {
            debug!("Request IDs disabled");
            return Ok(());
        }
        let app = ctx.lookup(APP).context("request_id must be registered after http_app")?;
        let header = self.header.clone().map_or_else(|| self.config.validate(), Ok)?;

        let settings = Arc::new(Settings {
            header: header.clone(),
            accept_external: self.config.accept_external,
            set_on_response: self.config.set_on_response,
            add_to_span: self.config.add_to_span,
        });
        app.layer(move |router| router.layer(axum::middleware::from_fn_with_state(settings, request_id_middleware)))?;

        debug!(header = %header, accept_external = self.config.accept_external, "Request ID middleware registered");
        ctx.publish(REQUEST_ID_HEADER, header)?;
        Ok(())
    }
}
