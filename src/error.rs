//! Unified error types for chatgate.
//! Used by: gate, store, completion, transcript, handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const BLOCKED_MESSAGE: &str = "Your IP has been blocked due to repeated irrelevant messages.";
pub const BACKEND_MESSAGE: &str = "Failed to get response from AI backend.";
pub const NOT_BLOCKED_MESSAGE: &str = "IP not found in blocked list.";
pub const RATE_LIMITED_MESSAGE: &str =
    "Rate limit exceeded. Please wait a moment before sending another message.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("client blocked (ip: {ip})")]
    Blocked { ip: String, newly_blocked: bool },

    #[error("ip not in block list: {0}")]
    NotBlocked(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("completion backend failed: {0}")]
    Backend(String),

    #[error("reference fetch failed: {0}")]
    ReferenceFetch(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lock poisoned: {0}")]
    Lock(&'static str),
}

impl Error {
    /// The message shown to the caller. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Error::Blocked { .. } => BLOCKED_MESSAGE.into(),
            Error::NotBlocked(_) => NOT_BLOCKED_MESSAGE.into(),
            Error::RateLimited(_) => RATE_LIMITED_MESSAGE.into(),
            Error::Validation(reason) => reason.clone(),
            Error::Backend(_) | Error::Http(_) => BACKEND_MESSAGE.into(),
            Error::ReferenceFetch(_)
            | Error::Config(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::Lock(_) => "internal server error".into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Blocked { .. } => StatusCode::FORBIDDEN,
            Error::NotBlocked(_) => StatusCode::NOT_FOUND,
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Backend(_)
            | Error::Http(_)
            | Error::ReferenceFetch(_)
            | Error::Config(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::Lock(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Maps a poisoned-lock error into [`Error::Lock`] tagged with the lock's name.
pub fn lock_err<T>(name: &'static str) -> impl FnOnce(T) -> Error {
    move |_| Error::Lock(name)
}

pub type Result<T> = std::result::Result<T, Error>;
