use axum::Router;
use axum::routing::MethodRouter;
use fhub_kernel::prelude::FeatureError;
use parking_lot::Mutex;
use std::fmt;
use tower_http::trace::TraceLayer;
use tracing::debug;

type LayerFn = Box<dyn FnOnce(Router) -> Router + Send>;

struct Parts {
    router: Router,
    layers: Vec<LayerFn>,
    trace: bool,
}

/// Shared handle to the application router, published under [`APP`](crate::APP).
///
/// Features registered after `http_app` add routes and middleware through it
/// during `init`. The server feature takes the finished router in
/// `on_startup`; every call after that fails with
/// [`FeatureError::Unavailable`].
///
/// Layers added with [`layer`](Self::layer) are applied when the router is
/// taken, so they cover every route regardless of when it was added. The
/// first registered layer is the outermost: requests pass through layers in
/// the order their features were registered, and a later layer can read
/// request extensions an earlier one inserted.
pub struct HttpApp {
    parts: Mutex<Option<Parts>>,
}

impl HttpApp {
    pub(crate) fn new(router: Router, trace: bool) -> Self {
        Self { parts: Mutex::new(Some(Parts { router, layers: Vec::new(), trace })) }
    }

    /// Adds a route.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] once the router was taken.
    pub fn route(&self, path: &str, method_router: MethodRouter) -> Result<(), FeatureError> {
        self.map(|router| router.route(path, method_router))
    }

    /// Merges a feature's own router.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] once the router was taken.
    pub fn merge(&self, other: Router) -> Result<(), FeatureError> {
        self.map(|router| router.merge(other))
    }

    /// Mounts `other` under `path`.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] once the router was taken.
    pub fn nest(&self, path: &str, other: Router) -> Result<(), FeatureError> {
        self.map(|router| router.nest(path, other))
    }

    /// Registers middleware applied over all routes when the router is taken.
    ///
    /// ```rust,ignore
    /// app.layer(|router| router.layer(axum::middleware::from_fn(audit)))?;
    /// ```
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] once the router was taken.
    pub fn layer<F>(&self, apply: F) -> Result<(), FeatureError>
    where
        F: FnOnce(Router) -> Router + Send + 'static,
    {
        let mut guard = self.parts.lock();
        let parts = guard.as_mut().ok_or_else(taken)?;
        parts.layers.push(Box::new(apply));
        Ok(())
    }

    /// Transforms the router in place.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] once the router was taken.
    pub fn map<F>(&self, apply: F) -> Result<(), FeatureError>
    where
        F: FnOnce(Router) -> Router,
    {
        let mut guard = self.parts.lock();
        let parts = guard.as_mut().ok_or_else(taken)?;
        let router = std::mem::take(&mut parts.router);
        parts.router = apply(router);
        Ok(())
    }

    /// Finishes the router: tracing innermost, the first registered layer outermost.
    ///
    /// # Errors
    /// [`FeatureError::Unavailable`] when called a second time.
    pub fn take(&self) -> Result<Router, FeatureError> {
        let Parts { router, layers, trace } = self.parts.lock().take().ok_or_else(taken)?;

        let router = if trace { router.layer(TraceLayer::new_for_http()) } else { router };
        debug!(layers = layers.len(), trace, "Finalizing application router");

        Ok(layers.into_iter().rev().fold(router, |router, apply| apply(router)))
    }

    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.parts.lock().is_none()
    }
}

impl fmt::Debug for HttpApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.parts.lock();
        let mut s = f.debug_struct("HttpApp");
        match guard.as_ref() {
            Some(parts) => s.field("layers", &parts.layers.len()).field("trace", &parts.trace),
            None => s.field("taken", &true),
        };
        s.finish()
    }
}

fn taken() -> FeatureError {
    FeatureError::unavailable("application router was already taken by the server")
}
