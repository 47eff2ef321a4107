//! Abuse gate: block check, daily counters, and the irrelevant-message threshold.
//! Used by: handlers::chat, handlers::unblock, state.

use std::sync::{Arc, Mutex};

use chrono::{Days, NaiveDate, Utc};

use crate::classifier::RelevanceClassifier;
use crate::error::{lock_err, Error, Result};
use crate::store::{ClientRecord, ClientStore};

pub const DEFAULT_IRRELEVANT_THRESHOLD: u32 = 5;
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// A client is blocked once its daily irrelevant count exceeds this.
    pub irrelevant_threshold: u32,
    pub reset_on_unblock: bool,
    pub retention_days: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            irrelevant_threshold: DEFAULT_IRRELEVANT_THRESHOLD,
            reset_on_unblock: true,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Outcome of an admitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub relevant: bool,
    pub total_count: u32,
    pub irrelevant_count: u32,
}

pub struct AbuseGate {
    store: Arc<dyn ClientStore>,
    classifier: RelevanceClassifier,
    config: GateConfig,
    admission: Mutex<()>,
    last_sweep: Mutex<Option<NaiveDate>>,
}

impl AbuseGate {
    pub fn new(store: Arc<dyn ClientStore>, classifier: RelevanceClassifier, config: GateConfig) -> Self {
        Self {
            store,
            classifier,
            config,
            admission: Mutex::new(()),
            last_sweep: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &dyn ClientStore {
        self.store.as_ref()
    }

    /// Rejects `ip` if it is in the block set. Touches no counters.
    pub fn check_blocked(&self, ip: &str) -> Result<()> {
        if self.store.is_blocked(ip)? {
            return Err(Error::Blocked { ip: ip.to_owned(), newly_blocked: false });
        }
        Ok(())
    }

    pub fn admit(&self, ip: &str, message: &str, reference: &str) -> Result<Admission> {
        self.admit_on(ip, message, reference, Utc::now().date_naive())
    }

    /// Runs one inbound message through the gate as of `today`.
    ///
    /// Blocked clients are rejected before any counter moves. Irrelevant
    /// messages are still admitted until the daily threshold is crossed.
    pub fn admit_on(&self, ip: &str, message: &str, reference: &str, today: NaiveDate) -> Result<Admission> {
        let relevant = self.classifier.classify(message, reference);
        let _guard = self.admission.lock().map_err(lock_err("admission"))?;

        if self.store.is_blocked(ip)? {
            tracing::info!(ip = %ip, "rejected blocked client");
            return Err(Error::Blocked { ip: ip.to_owned(), newly_blocked: false });
        }

        self.maybe_sweep(today)?;

        let mut record = match self.store.get(ip)? {
            Some(r) if r.last_reset_date == today => r,
            _ => ClientRecord::fresh(today),
        };
        record.total_count += 1;
        if !relevant {
            record.irrelevant_count += 1;
        }
        self.store.upsert(ip, record)?;

        tracing::info!(
            ip = %ip,
            relevant,
            total = record.total_count,
            irrelevant = record.irrelevant_count,
            "block check"
        );

        if !relevant && record.irrelevant_count > self.config.irrelevant_threshold {
            self.store.block(ip)?;
            tracing::warn!(ip = %ip, irrelevant = record.irrelevant_count, "ip blocked");
            return Err(Error::Blocked { ip: ip.to_owned(), newly_blocked: true });
        }

        Ok(Admission {
            relevant,
            total_count: record.total_count,
            irrelevant_count: record.irrelevant_count,
        })
    }

    /// Removes `ip` from the block set. Counters are cleared too when
    /// `reset_on_unblock` is set.
    pub fn unblock(&self, ip: &str) -> Result<()> {
        let _guard = self.admission.lock().map_err(lock_err("admission"))?;

        if !self.store.unblock(ip)? {
            return Err(Error::NotBlocked(ip.to_owned()));
        }
        if self.config.reset_on_unblock {
            self.store.reset(ip)?;
        }
        tracing::info!(ip = %ip, reset = self.config.reset_on_unblock, "ip unblocked");
        Ok(())
    }

    fn maybe_sweep(&self, today: NaiveDate) -> Result<()> {
        let mut last = self.last_sweep.lock().map_err(lock_err("sweep"))?;
        if *last == Some(today) {
            return Ok(());
        }
        *last = Some(today);

        let Some(cutoff) = today.checked_sub_days(Days::new(self.config.retention_days)) else {
            return Ok(());
        };
        let evicted = self.store.evict_before(cutoff)?;
        if evicted > 0 {
            tracing::debug!(evicted, %cutoff, "evicted stale client records");
        }
        Ok(())
    }
}
