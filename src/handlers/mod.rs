//! HTTP handler modules.
//! Used by: server.

pub mod admin;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod transcript;
