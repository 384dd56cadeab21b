use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, info_span};
use uuid::Uuid;

const MAX_EXTERNAL_LEN: usize = 128;

/// Identifier of the request being handled.
///
/// Available to handlers as an `Extension<RequestId>` and, anywhere inside
/// the request task, through [`current_request_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT: RequestId;
}

/// Request ID of the request task this is called from.
#[must_use]
pub fn current_request_id() -> Option<RequestId> {
    CURRENT.try_with(Clone::clone).ok()
}

#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) header: HeaderName,
    pub(crate) accept_external: bool,
    pub(crate) set_on_response: bool,
    pub(crate) add_to_span: bool,
}

impl Settings {
    fn resolve(&self, headers: &HeaderMap) -> RequestId {
        if self.accept_external
            && let Some(raw) = headers.get(&self.header).and_then(|v| v.to_str().ok()).map(str::trim)
            && is_well_formed_id(raw)
        {
            return RequestId(raw.to_owned());
        }
        RequestId::generate()
    }
}

/// Whether a client supplied ID may be trusted: 1 to 128 ASCII letters,
/// digits, `-`, `_` or `.`.
#[must_use]
pub fn is_well_formed_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_EXTERNAL_LEN
        && value.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

pub(crate) async fn request_id_middleware(
    State(settings): State<Arc<Settings>>,
    mut req: Request,
    next: Next,
) -> Response {
    let id = settings.resolve(req.headers());
    let value = HeaderValue::from_str(id.as_str()).ok();

    if let Some(value) = &value {
        req.headers_mut().insert(settings.header.clone(), value.clone());
    }
    req.extensions_mut().insert(id.clone());

    let handled = CURRENT.scope(id.clone(), next.run(req));
    let mut res = if settings.add_to_span {
        handled.instrument(info_span!("request", request_id = %id)).await
    } else {
        handled.await
    };

    if settings.set_on_response
        && let Some(value) = value
    {
        res.headers_mut().insert(settings.header.clone(), value);
    }
    res
}
