//! # HTTP server feature
//!
//! The process's server feature. In `on_startup` it loads TLS material, binds
//! the listening socket and takes the finished router from
//! [`fhub_http_app::APP`], so a port already in use fails startup. It then
//! serves the router with `axum-server` (HTTPS through rustls when `tls` is
//! configured) until the runner asks it to stop, draining open connections
//! through a graceful-shutdown handle.
//!
//! Must be registered after `http_app` and after every feature that adds
//! routes.
//!
//! ```yaml
//! http_server:
//!   address: 0.0.0.0
//!   port: 8443
//!   tls:
//!     cert: ./certs/server.crt
//!     key: ./certs/server.key
//! ```

mod config;

pub use crate::config::{HttpServerConfig, TlsConfig};
pub use axum_server::Handle;

use axum::Router;
use fhub_http_app::{APP, HttpApp};
use fhub_kernel::prelude::*;
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

/// Section and feature name.
pub const NAME: &str = "http_server";

pub struct HttpServerFeature {
    config: HttpServerConfig,
    app: Option<Arc<HttpApp>>,
    router: Option<Router>,
    listener: Option<TcpListener>,
    #[cfg(feature = "tls")]
    tls: Option<RustlsConfig>,
    handle: Handle<SocketAddr>,
}

impl Default for HttpServerFeature {
    fn default() -> Self {
        Self {
            config: HttpServerConfig::default(),
            app: None,
            router: None,
            listener: None,
            #[cfg(feature = "tls")]
            tls: None,
            handle: Handle::<SocketAddr>::new(),
        }
    }
}

impl HttpServerFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the server this feature runs. `listening().await` yields the
    /// bound address, which is how callers learn an ephemeral port.
    #[must_use]
    pub fn handle(&self) -> Handle<SocketAddr> {
        self.handle.clone()
    }

    #[must_use]
    pub const fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Address of the socket bound in `on_startup`, until serving begins.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|listener| listener.local_addr().ok())
    }

    fn bind_listener(&self) -> Result<TcpListener, FeatureError> {
        let address = self.config.socket_addr();
        let listener = TcpListener::bind(address).with_context(|| format!("binding HTTP server to {address}"))?;
        listener.set_nonblocking(true).context("switching HTTP listener to non-blocking mode")?;
        Ok(listener)
    }

    async fn prepare_tls(&mut self) -> Result<(), FeatureError> {
        let Some(tls) = self.config.tls.clone() else {
            return Ok(());
        };
        tls.validate()?;
        self.load_tls(&tls).await
    }

    #[cfg(feature = "tls")]
    async fn load_tls(&mut self, tls: &TlsConfig) -> Result<(), FeatureError> {
        let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
            .await
            .with_context(|| format!("loading TLS material from {}", tls.cert.display()))?;
        self.tls = Some(rustls);
        Ok(())
    }

    #[cfg(not(feature = "tls"))]
    #[allow(clippy::unused_async, clippy::unused_self)]
    async fn load_tls(&mut self, _tls: &TlsConfig) -> Result<(), FeatureError> {
        Err(FeatureError::config("TLS is configured but fhub-http-server was built without the `tls` feature"))
    }

    async fn run_server(&mut self, listener: TcpListener, router: Router) -> io::Result<()> {
        let service = router.into_make_service_with_connect_info::<SocketAddr>();

        #[cfg(feature = "tls")]
        {
            if let Some(tls) = self.tls.take() {
                return axum_server::from_tcp_rustls(listener, tls)?.handle(self.handle.clone()).serve(service).await;
            }
        }

        axum_server::from_tcp(listener)?.handle(self.handle.clone()).serve(service).await
    }
}

#[async_trait]
impl Feature for HttpServerFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        self.config = section.parse_or_default()?;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.app = Some(ctx.lookup(APP).context("http_server must be registered after http_app")?);
        Ok(())
    }

    async fn on_startup(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        self.prepare_tls().await?;
        let listener = self.bind_listener()?;

        let app = self.app.take().ok_or_else(|| FeatureError::unavailable("http_app binding was not resolved"))?;
        self.router = Some(app.take()?);

        let address = listener.local_addr().context("reading bound HTTP address")?;
        self.listener = Some(listener);
        info!(address = %address, tls = self.config.tls.is_some(), "HTTP server bound");
        Ok(())
    }

    async fn on_shutdown(&mut self, _ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        if self.router.take().is_some() {
            debug!("Router released without serving");
        }
        if self.listener.take().is_some() {
            debug!("Listening socket closed without serving");
        }
        self.app = None;
        Ok(())
    }

    fn is_server(&self) -> bool {
        true
    }

    async fn serve(&mut self, mut stop: StopSignal) -> Result<(), FeatureError> {
        let (Some(router), Some(listener)) = (self.router.take(), self.listener.take()) else {
            return Err(FeatureError::unavailable("HTTP server is not prepared, on_startup did not complete"));
        };
        let address = listener.local_addr().context("reading bound HTTP address")?;
        let drain = self.config.drain_timeout();

        let shutdown = self.handle.clone();
        let watcher = tokio::spawn(async move {
            let reason = stop.wait().await;
            info!(%reason, drain = ?drain, "Draining HTTP connections");
            shutdown.graceful_shutdown(Some(drain));
        });

        info!(address = %address, tls = self.config.tls.is_some(), "Starting HTTP server");
        let served = self.run_server(listener, router).await;
        watcher.abort();

        served.with_context(|| format!("HTTP server on {address}"))?;
        info!("HTTP server stopped");
        Ok(())
    }
}

impl fmt::Debug for HttpServerFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerFeature")
            .field("config", &self.config)
            .field("prepared", &self.router.is_some())
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bind(value: serde_json::Value) -> Result<HttpServerConfig, FeatureError> {
        let mut feature = HttpServerFeature::new();
        feature.bind_config(ConfigSection::Present(value))?;
        Ok(feature.config)
    }

    #[test]
    fn test_defaults() {
        let mut feature = HttpServerFeature::new();
        assert!(feature.bind_config(ConfigSection::Absent).is_ok());
        assert_eq!(feature.config().socket_addr().to_string(), "0.0.0.0:8000");
        assert!(feature.is_server());
    }

    #[test]
    fn test_section_is_parsed() {
        let config = bind(json!({ "address": "127.0.0.1", "port": 9000, "tls": { "cert": "c.pem", "key": "k.pem" } }))
            .expect("valid section");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.tls.map(|tls| tls.key), Some("k.pem".into()));
    }

    #[test]
    fn test_bad_address_is_rejected() {
        assert!(matches!(bind(json!({ "address": "localhost" })), Err(FeatureError::Deserialize { .. })));
        assert!(matches!(bind(json!({ "port": 70000 })), Err(FeatureError::Deserialize { .. })));
    }

    #[test]
    fn test_missing_tls_files_are_rejected() {
        let tls = TlsConfig { cert: "/nonexistent/server.crt".into(), key: "/nonexistent/server.key".into() };
        assert!(matches!(tls.validate(), Err(FeatureError::Config { .. })));
    }
}
