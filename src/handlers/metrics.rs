//! Metrics snapshot endpoint.
//! Used by: server.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;
use crate::telemetry::MetricsSnapshot;

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub blocked_clients: usize,
    pub tracked_clients: usize,
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>> {
    Ok(Json(MetricsResponse {
        counters: state.metrics.snapshot(),
        blocked_clients: state.gate.store().blocked()?.len(),
        tracked_clients: state.rate_limiter.tracked_ips(),
    }))
}
