//! Chat relay endpoint: validation, rate limit, abuse gate, completion.
//! Used by: server.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::client_ip::client_ip;
use crate::console;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::transcript::sqlite::Role;

pub const FALLBACK_REPLY: &str = "Sorry, I could not generate a response.";
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

fn validate_message(message: &str) -> Result<()> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("message must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(Error::Validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

fn record_turn(state: &AppState, ip: &str, role: Role, content: &str) {
    if let Err(e) = state.transcript.append(ip, role, content, Utc::now()) {
        tracing::warn!(ip = %ip, error = %e, "transcript append failed");
    }
}

fn track_blocked(state: &AppState, err: Error) -> Error {
    if let Error::Blocked { ip, newly_blocked } = &err {
        state.metrics.record_blocked_rejection();
        if *newly_blocked {
            state.metrics.record_block();
            console::log_blocked(ip);
        }
    }
    err
}

pub async fn chat(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    validate_message(&req.message)?;
    state.metrics.record_message();

    // Blocked clients get the blocked error whatever their request rate.
    state.gate.check_blocked(&ip).map_err(|e| track_blocked(&state, e))?;

    if let Err(e) = state.rate_limiter.check_ip(&ip) {
        state.metrics.record_rate_limited();
        console::log_rate_limited(&ip, &e.to_string());
        return Err(e.into());
    }

    let reference = state.reference.snapshot();
    let admission = state
        .gate
        .admit(&ip, &req.message, &reference)
        .map_err(|e| track_blocked(&state, e))?;
    state.metrics.record_admission(admission.relevant);
    if !admission.relevant {
        console::log_irrelevant(&ip, &req.message, admission.irrelevant_count);
    }

    record_turn(&state, &ip, Role::User, &req.message);

    let reply = match state.completion.complete(&state.system_prompt, &req.message).await {
        Ok(Some(reply)) => reply,
        Ok(None) => FALLBACK_REPLY.to_owned(),
        Err(e) => {
            state.metrics.record_backend_failure();
            tracing::error!(ip = %ip, error = %e, "completion failed");
            console::log_backend_failure(&ip, &e.to_string());
            return Err(Error::Backend(e.to_string()));
        }
    };
    state.metrics.record_completion();

    record_turn(&state, &ip, Role::Assistant, &reply);
    Ok(Json(ChatResponse { reply }))
}
