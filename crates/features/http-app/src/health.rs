use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::{Json, response::IntoResponse};
use fhub_kernel::prelude::{LifecycleState, LifecycleWatch};
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Instant;

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    /// Runner state, e.g. `running` or `shutting_down`.
    lifecycle: String,
    version: &'static str,
    uptime_secs: u64,
}

pub(crate) static STARTED_AT: LazyLock<Instant> = LazyLock::new(Instant::now);

/// `503 draining` once the runner leaves `Running`, so balancers stop routing here first.
pub(crate) const fn availability(state: LifecycleState) -> (StatusCode, &'static str) {
    match state {
        LifecycleState::ShuttingDown | LifecycleState::Stopped => (StatusCode::SERVICE_UNAVAILABLE, "draining"),
        LifecycleState::NotStarted | LifecycleState::Starting | LifecycleState::Running => (StatusCode::OK, "up"),
    }
}

pub(crate) async fn health_handler(State(lifecycle): State<LifecycleWatch>) -> impl IntoResponse {
    let state = lifecycle.current();
    let (code, status) = availability(state);
    let report = HealthReport {
        status,
        lifecycle: state.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: STARTED_AT.elapsed().as_secs(),
    };

    (code, [(header::CACHE_CONTROL, "no-store")], Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_draining_states_are_unavailable() {
        assert_eq!(availability(LifecycleState::Running), (StatusCode::OK, "up"));
        assert_eq!(availability(LifecycleState::Starting).0, StatusCode::OK);
        assert_eq!(availability(LifecycleState::ShuttingDown), (StatusCode::SERVICE_UNAVAILABLE, "draining"));
        assert_eq!(availability(LifecycleState::Stopped).0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
