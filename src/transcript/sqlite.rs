//! SQLite-backed transcript of chat messages and replies.
//! Used by: handlers::chat, handlers::transcript, state.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::{lock_err, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

pub struct TranscriptLog {
    conn: Mutex<Connection>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub ip: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl TranscriptLog {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS transcript (
                id TEXT PRIMARY KEY,
                ip TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Appends one message and returns its id.
    pub fn append(&self, ip: &str, role: Role, content: &str, at: DateTime<Utc>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().map_err(lock_err("transcript"))?;
        conn.execute(
            "INSERT INTO transcript (id, ip, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            (&id, ip, role.as_str(), content, at.to_rfc3339()),
        )?;
        Ok(id)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<TranscriptEntry>> {
        let conn = self.conn.lock().map_err(lock_err("transcript"))?;
        let mut stmt = conn.prepare(
            "SELECT id, ip, role, content, created_at FROM transcript ORDER BY rowid DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([limit], |row| {
                Ok(TranscriptEntry {
                    id: row.get(0)?,
                    ip: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
