//! Process configuration read from the environment (and `.env`, if present).
//! Used by: main, state.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::completion::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_RETRY_DELAY, DEFAULT_SYSTEM_PROMPT};
use crate::error::{Error, Result};
use crate::gate::{GateConfig, DEFAULT_IRRELEVANT_THRESHOLD, DEFAULT_RETENTION_DAYS};
use crate::ratelimit::RateLimitConfig;
use crate::reference::{DEFAULT_REFERENCE_URL, DEFAULT_REFRESH_INTERVAL};

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_TRANSCRIPT_DB: &str = "chatgate.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub transcript_db: String,
    pub reference_url: String,
    pub reference_refresh: Duration,
    pub fail_open: bool,
    pub gate: GateConfig,
    pub rate_limit: RateLimitConfig,
    pub provider: ProviderConfig,
    pub system_prompt: String,
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub retry_delay: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl Config {
    /// | Variable                    | Default                   |
    /// |-----------------------------|---------------------------|
    /// | `BIND_ADDR`                 | `0.0.0.0:$PORT`           |
    /// | `PORT`                      | `3001`                    |
    /// | `TRANSCRIPT_DB`             | `chatgate.db`             |
    /// | `REFERENCE_URL`             | `https://digitalstaff.ca` |
    /// | `REFERENCE_REFRESH_SECS`    | `3600`                    |
    /// | `RELEVANCE_FAIL_OPEN`       | `true`                    |
    /// | `IRRELEVANT_THRESHOLD`      | `5`                       |
    /// | `RESET_ON_UNBLOCK`          | `true`                    |
    /// | `RECORD_RETENTION_DAYS`     | `7`                       |
    /// | `OPENAI_API_KEY`            | `VITE_OPENAI_API_KEY`     |
    /// | `OPENAI_BASE_URL`           | `https://api.openai.com`  |
    /// | `OPENAI_MODEL`              | `gpt-3.5-turbo`           |
    /// | `OPENAI_RETRY_DELAY_MS`     | `5000`                    |
    /// | `SYSTEM_PROMPT`             | Winston persona           |
    /// | `RATE_LIMIT_PER_MIN`        | `10`                      |
    /// | `RATE_LIMIT_GLOBAL_PER_SEC` | `1000`                    |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| format!("0.0.0.0:{port}"));

        let reference_url = validate_url(
            get("REFERENCE_URL").unwrap_or_else(|| DEFAULT_REFERENCE_URL.into()),
            "REFERENCE_URL",
        )?;
        let refresh_secs = parse_or(
            get("REFERENCE_REFRESH_SECS"),
            "REFERENCE_REFRESH_SECS",
            DEFAULT_REFRESH_INTERVAL.as_secs(),
        )?;
        if refresh_secs == 0 {
            return Err(Error::Config("REFERENCE_REFRESH_SECS must be positive".into()));
        }

        let gate = GateConfig {
            irrelevant_threshold: parse_or(
                get("IRRELEVANT_THRESHOLD"),
                "IRRELEVANT_THRESHOLD",
                DEFAULT_IRRELEVANT_THRESHOLD,
            )?,
            reset_on_unblock: parse_or(get("RESET_ON_UNBLOCK"), "RESET_ON_UNBLOCK", true)?,
            retention_days: parse_or(
                get("RECORD_RETENTION_DAYS"),
                "RECORD_RETENTION_DAYS",
                DEFAULT_RETENTION_DAYS,
            )?,
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            global_per_sec: parse_or(
                get("RATE_LIMIT_GLOBAL_PER_SEC"),
                "RATE_LIMIT_GLOBAL_PER_SEC",
                defaults.global_per_sec,
            )?,
            per_ip_per_min: parse_or(get("RATE_LIMIT_PER_MIN"), "RATE_LIMIT_PER_MIN", defaults.per_ip_per_min)?,
        };

        let provider = ProviderConfig {
            api_key: get("OPENAI_API_KEY")
                .or_else(|| get("VITE_OPENAI_API_KEY"))
                .unwrap_or_default(),
            base_url: validate_url(
                get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
                "OPENAI_BASE_URL",
            )?,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            retry_delay: Duration::from_millis(parse_or(
                get("OPENAI_RETRY_DELAY_MS"),
                "OPENAI_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY.as_millis() as u64,
            )?),
        };

        Ok(Self {
            bind_addr,
            transcript_db: get("TRANSCRIPT_DB").unwrap_or_else(|| DEFAULT_TRANSCRIPT_DB.into()),
            reference_url,
            reference_refresh: Duration::from_secs(refresh_secs),
            fail_open: parse_or(get("RELEVANCE_FAIL_OPEN"), "RELEVANCE_FAIL_OPEN", true)?,
            gate,
            rate_limit,
            provider,
            system_prompt: get("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key}: cannot parse {v:?}"))),
    }
}

fn validate_url(raw: String, key: &str) -> Result<String> {
    let url = Url::parse(&raw).map_err(|e| Error::Config(format!("{key}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(raw),
        other => Err(Error::Config(format!("{key}: unsupported scheme {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() -> Result<()> {
        let c = config(&[])?;
        assert_eq!(c.bind_addr, "0.0.0.0:3001");
        assert_eq!(c.reference_url, DEFAULT_REFERENCE_URL);
        assert_eq!(c.reference_refresh, Duration::from_secs(3600));
        assert!(c.fail_open);
        assert_eq!(c.gate.irrelevant_threshold, 5);
        assert!(c.gate.reset_on_unblock);
        assert_eq!(c.rate_limit.per_ip_per_min, 10);
        assert_eq!(c.provider.model, "gpt-3.5-turbo");
        assert_eq!(c.system_prompt, DEFAULT_SYSTEM_PROMPT);
        Ok(())
    }

    #[test]
    fn port_feeds_bind_addr() -> Result<()> {
        assert_eq!(config(&[("PORT", "8080")])?.bind_addr, "0.0.0.0:8080");
        assert_eq!(
            config(&[("PORT", "8080"), ("BIND_ADDR", "127.0.0.1:9000")])?.bind_addr,
            "127.0.0.1:9000"
        );
        Ok(())
    }

    #[test]
    fn api_key_falls_back_to_vite_variable() -> Result<()> {
        let c = config(&[("VITE_OPENAI_API_KEY", "sk-from-vite")])?;
        assert_eq!(c.provider.api_key, "sk-from-vite");
        let c = config(&[("OPENAI_API_KEY", "sk-primary"), ("VITE_OPENAI_API_KEY", "sk-from-vite")])?;
        assert_eq!(c.provider.api_key, "sk-primary");
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> Result<()> {
        let c = config(&[
            ("IRRELEVANT_THRESHOLD", "3"),
            ("RESET_ON_UNBLOCK", "false"),
            ("RELEVANCE_FAIL_OPEN", "false"),
            ("OPENAI_RETRY_DELAY_MS", "250"),
        ])?;
        assert_eq!(c.gate.irrelevant_threshold, 3);
        assert!(!c.gate.reset_on_unblock);
        assert!(!c.fail_open);
        assert_eq!(c.provider.retry_delay, Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn bad_number_is_config_error() {
        assert!(matches!(config(&[("IRRELEVANT_THRESHOLD", "many")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("REFERENCE_REFRESH_SECS", "0")]), Err(Error::Config(_))));
    }

    #[test]
    fn bad_url_is_config_error() {
        assert!(matches!(config(&[("REFERENCE_URL", "not a url")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("OPENAI_BASE_URL", "ftp://x")]), Err(Error::Config(_))));
    }

    #[test]
    fn api_key_is_redacted_in_debug() -> Result<()> {
        let c = config(&[("OPENAI_API_KEY", "sk-very-secret-key-value")])?;
        assert!(!format!("{c:?}").contains("sk-very-secret"));
        Ok(())
    }
}
