//! Block-list administration endpoints.
//! Used by: server.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::console;
use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UnblockRequest {
    #[serde(default)]
    pub ip: String,
}

#[derive(Serialize)]
pub struct UnblockResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct BlockedResponse {
    pub blocked: Vec<String>,
}

pub async fn unblock(
    State(state): State<AppState>,
    Json(req): Json<UnblockRequest>,
) -> Result<Json<UnblockResponse>> {
    let ip = req.ip.trim();
    if ip.is_empty() {
        return Err(Error::NotBlocked(String::new()));
    }

    state.gate.unblock(ip)?;
    state.metrics.record_unblock();
    console::log_unblock(ip);

    Ok(Json(UnblockResponse {
        success: true,
        message: format!("IP {} unblocked.", ip),
    }))
}

pub async fn blocked(State(state): State<AppState>) -> Result<Json<BlockedResponse>> {
    let blocked = state.gate.store().blocked()?;
    Ok(Json(BlockedResponse { blocked }))
}
