use axum::extract::rejection::ExtensionRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Event target; filter on it to route access logs separately.
pub const TARGET: &str = "fhub::access";

const MISSING: &str = "-";

#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) message: String,
    pub(crate) exclude_paths: Vec<String>,
}

fn header_or_missing(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or(MISSING).to_owned()
}

pub(crate) async fn access_log_middleware(
    State(settings): State<Arc<Settings>>,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    if settings.exclude_paths.iter().any(|excluded| *excluded == path) {
        return next.run(req).await;
    }

    let client_ip = connect_info.map_or_else(|_| MISSING.to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
    let user_agent = header_or_missing(req.headers(), header::USER_AGENT);
    let http_referer = header_or_missing(req.headers(), header::REFERER);
    let request_line = format!("{} {path}", req.method());

    let started = Instant::now();
    let res = next.run(req).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(
        target: TARGET,
        client_ip = %client_ip,
        user_agent = %user_agent,
        request_line = %request_line,
        status_code = res.status().as_u16(),
        http_referer = %http_referer,
        latency_ms,
        "{}",
        settings.message
    );
    res
}
