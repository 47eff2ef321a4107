//! Client identifier derivation for the abuse gate.
//! Used by: handlers::chat.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// First `X-Forwarded-For` entry, else the socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_owned(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_owned(),
    }
}
