//! Chat-completions client for the model provider.
//! Used by: handlers::chat, state.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Winston, a friendly and professional AI assistant at DigitalStaff. Help users with automation-related questions and invite them to schedule a call at https://calendly.com/digitalstaff/call-with-oscar/ if needed.";

/// Sends a system instruction plus one user message and returns the reply.
///
/// `Ok(None)` means the provider answered without any content.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<Option<String>>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
    }
}

pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    retry_delay: Duration,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        retry_delay: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            tracing::warn!("no provider API key configured; completions will fail");
        } else if !looks_like_api_key(&api_key) {
            tracing::warn!("provider API key does not look like an sk- key");
        }

        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            url: format!("{}{}", base_url.trim_end_matches('/'), COMPLETIONS_PATH),
            api_key,
            model: model.into(),
            retry_delay,
        })
    }

    async fn send(&self, system: &str, user: &str) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };
        Ok(self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<Option<String>> {
        let mut response = self.send(system, user).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(delay = ?self.retry_delay, "provider rate limit hit, retrying once");
            tokio::time::sleep(self.retry_delay).await;
            response = self.send(system, user).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "provider returned an error");
            return Err(Error::Backend(format!("provider returned {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("failed to parse provider response: {e}")))?;
        Ok(parsed.into_content())
    }
}

fn looks_like_api_key(key: &str) -> bool {
    key.starts_with("sk-") && key.len() > 20
}
