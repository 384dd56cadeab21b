use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use fhub_kernel::prelude::FeatureError;
use fhub_request_id::{RequestId, is_well_formed_id};
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, info_span};
use uuid::Uuid;

/// Identifier tying together the work done for one logical operation, across
/// requests and services.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT: CorrelationId;
}

/// Correlation ID of the task this is called from, if one is in scope.
#[must_use]
pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT.try_with(Clone::clone).ok()
}

/// Like [`current_correlation_id`], for code that cannot run without one.
///
/// # Errors
/// [`FeatureError::Unavailable`] outside a correlated task.
pub fn require_correlation_id() -> Result<CorrelationId, FeatureError> {
    current_correlation_id().ok_or_else(|| FeatureError::unavailable("no correlation id is set for this task"))
}

/// Runs `fut` with `id` (or a fresh ID) as the current correlation ID.
///
/// For work started outside an HTTP request, such as background jobs.
pub async fn with_correlation_id<F>(id: Option<CorrelationId>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(id.unwrap_or_else(CorrelationId::generate), fut).await
}

#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) header: HeaderName,
    pub(crate) accept_external: bool,
    pub(crate) from_request_id: bool,
    pub(crate) set_on_response: bool,
}

impl Settings {
    /// Client header when trusted, else the request ID, else a new ID.
    fn resolve(&self, headers: &HeaderMap, request_id: Option<&RequestId>) -> CorrelationId {
        if self.accept_external
            && let Some(raw) = headers.get(&self.header).and_then(|v| v.to_str().ok()).map(str::trim)
            && is_well_formed_id(raw)
        {
            return CorrelationId::new(raw);
        }
        match request_id {
            Some(id) if self.from_request_id => CorrelationId::new(id.as_str()),
            _ => CorrelationId::generate(),
        }
    }
}

pub(crate) async fn correlation_id_middleware(
    State(settings): State<Arc<Settings>>,
    mut req: Request,
    next: Next,
) -> Response {
    let id = settings.resolve(req.headers(), req.extensions().get::<RequestId>());
    let value = HeaderValue::from_str(id.as_str()).ok();

    if let Some(value) = &value {
        req.headers_mut().insert(settings.header.clone(), value.clone());
    }
    req.extensions_mut().insert(id.clone());

    let span = info_span!("correlation", correlation_id = %id);
    let mut res = CURRENT.scope(id, next.run(req)).instrument(span).await;

    if settings.set_on_response
        && let Some(value) = value
    {
        res.headers_mut().insert(settings.header.clone(), value);
    }
    res
}
