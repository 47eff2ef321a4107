//! Per-client counters and the block set behind a swappable store.
//! Used by: gate, state.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{lock_err, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub total_count: u32,
    pub irrelevant_count: u32,
    pub last_reset_date: NaiveDate,
}

impl ClientRecord {
    pub fn fresh(today: NaiveDate) -> Self {
        Self { total_count: 0, irrelevant_count: 0, last_reset_date: today }
    }
}

/// Storage for abuse-gate state, keyed by client identifier.
///
/// Implementations must be safe to share across request tasks. The gate
/// serializes its own read-modify-write sequences, so individual calls only
/// need to be atomic on their own.
pub trait ClientStore: Send + Sync {
    fn get(&self, ip: &str) -> Result<Option<ClientRecord>>;
    fn upsert(&self, ip: &str, record: ClientRecord) -> Result<()>;
    /// Forgets the counters for `ip`. The next message starts a fresh record.
    fn reset(&self, ip: &str) -> Result<()>;

    fn is_blocked(&self, ip: &str) -> Result<bool>;
    fn block(&self, ip: &str) -> Result<()>;
    /// Returns whether `ip` was in the block set.
    fn unblock(&self, ip: &str) -> Result<bool>;
    fn blocked(&self) -> Result<Vec<String>>;

    /// Drops records last reset before `cutoff`. Block-set entries are kept.
    fn evict_before(&self, cutoff: NaiveDate) -> Result<usize>;
}

#[derive(Default)]
pub struct MemoryClientStore {
    records: Mutex<HashMap<Box<str>, ClientRecord>>,
    blocked: Mutex<HashSet<Box<str>>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl ClientStore for MemoryClientStore {
    fn get(&self, ip: &str) -> Result<Option<ClientRecord>> {
        let records = self.records.lock().map_err(lock_err("records"))?;
        Ok(records.get(ip).copied())
    }

    fn upsert(&self, ip: &str, record: ClientRecord) -> Result<()> {
        let mut records = self.records.lock().map_err(lock_err("records"))?;
        records.insert(ip.into(), record);
        Ok(())
    }

    fn reset(&self, ip: &str) -> Result<()> {
        let mut records = self.records.lock().map_err(lock_err("records"))?;
        records.remove(ip);
        Ok(())
    }

    fn is_blocked(&self, ip: &str) -> Result<bool> {
        let blocked = self.blocked.lock().map_err(lock_err("blocked"))?;
        Ok(blocked.contains(ip))
    }

    fn block(&self, ip: &str) -> Result<()> {
        let mut blocked = self.blocked.lock().map_err(lock_err("blocked"))?;
        blocked.insert(ip.into());
        Ok(())
    }

    fn unblock(&self, ip: &str) -> Result<bool> {
        let mut blocked = self.blocked.lock().map_err(lock_err("blocked"))?;
        Ok(blocked.remove(ip))
    }

    fn blocked(&self) -> Result<Vec<String>> {
        let blocked = self.blocked.lock().map_err(lock_err("blocked"))?;
        let mut ips: Vec<String> = blocked.iter().map(|ip| ip.to_string()).collect();
        ips.sort();
        Ok(ips)
    }

    fn evict_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut records = self.records.lock().map_err(lock_err("records"))?;
        let before = records.len();
        records.retain(|_, r| r.last_reset_date >= cutoff);
        Ok(before - records.len())
    }
}
