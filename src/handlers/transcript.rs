//! Transcript query endpoint.
//! Used by: server.

use axum::extract::State;
use axum::Json;

use crate::error::Result;
use crate::state::AppState;
use crate::transcript::sqlite::TranscriptEntry;

const RECENT_LIMIT: usize = 100;

pub async fn recent(State(state): State<AppState>) -> Result<Json<Vec<TranscriptEntry>>> {
    let entries = state.transcript.recent(RECENT_LIMIT)?;
    Ok(Json(entries))
}
