//! Shared application state.

use std::sync::Arc;

use crate::classifier::RelevanceClassifier;
use crate::completion::{CompletionClient, OpenAiClient, DEFAULT_SYSTEM_PROMPT};
use crate::config::Config;
use crate::error::Result;
use crate::gate::{AbuseGate, GateConfig};
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::reference::ReferenceDocument;
use crate::store::MemoryClientStore;
use crate::telemetry::Metrics;
use crate::transcript::sqlite::TranscriptLog;

pub struct AppStateInner {
    pub gate: AbuseGate,
    pub completion: Arc<dyn CompletionClient>,
    pub reference: Arc<ReferenceDocument>,
    pub transcript: TranscriptLog,
    pub metrics: Metrics,
    pub rate_limiter: RateLimiter,
    pub system_prompt: String,
}

pub type AppState = Arc<AppStateInner>;

struct StateBuilder {
    transcript: TranscriptLog,
    completion: Arc<dyn CompletionClient>,
    reference: Arc<ReferenceDocument>,
    fail_open: bool,
    gate: GateConfig,
    rate_limit: RateLimitConfig,
    system_prompt: String,
}

impl StateBuilder {
    fn build(self) -> AppState {
        let gate = AbuseGate::new(
            Arc::new(MemoryClientStore::new()),
            RelevanceClassifier::new(self.fail_open),
            self.gate,
        );

        Arc::new(AppStateInner {
            gate,
            completion: self.completion,
            reference: self.reference,
            transcript: self.transcript,
            metrics: Metrics::new(),
            rate_limiter: RateLimiter::new(self.rate_limit),
            system_prompt: self.system_prompt,
        })
    }
}

/// Builds the process state. The reference refresher writes into
/// `state.reference`.
pub fn build_state(config: &Config) -> Result<AppState> {
    let provider = &config.provider;
    let completion = OpenAiClient::new(
        provider.api_key.clone(),
        provider.model.clone(),
        &provider.base_url,
        provider.retry_delay,
    )?;

    Ok(StateBuilder {
        transcript: TranscriptLog::open(&config.transcript_db)?,
        completion: Arc::new(completion),
        reference: Arc::new(ReferenceDocument::new()),
        fail_open: config.fail_open,
        gate: config.gate,
        rate_limit: config.rate_limit,
        system_prompt: config.system_prompt.clone(),
    }.build())
}

pub fn build_test_state(completion: Arc<dyn CompletionClient>) -> Result<AppState> {
    build_test_state_with_limits(
        completion,
        RateLimitConfig { global_per_sec: 1000, per_ip_per_min: 1000 },
    )
}

pub fn build_test_state_with_limits(
    completion: Arc<dyn CompletionClient>,
    rate_limit: RateLimitConfig,
) -> Result<AppState> {
    Ok(StateBuilder {
        transcript: TranscriptLog::open_in_memory()?,
        completion,
        reference: Arc::new(ReferenceDocument::new()),
        fail_open: true,
        gate: GateConfig::default(),
        rate_limit,
        system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
    }.build())
}
