//! Append-only chat transcript storage.
//! Used by: handlers, state.

pub mod sqlite;
