//! Cached reference page used as an auxiliary relevance signal, and its
//! periodic refresher.
//! Used by: state, handlers::chat, main.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub const DEFAULT_REFERENCE_URL: &str = "https://digitalstaff.ca";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Last successfully fetched copy of the reference page. Empty until the
/// first fetch succeeds.
pub struct ReferenceDocument {
    content: RwLock<Arc<str>>,
}

impl Default for ReferenceDocument {
    fn default() -> Self {
        Self { content: RwLock::new(Arc::from("")) }
    }
}

impl ReferenceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<str> {
        self.content
            .read()
            .map(|c| Arc::clone(&c))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    pub fn replace(&self, content: String) {
        let content: Arc<str> = content.into();
        match self.content.write() {
            Ok(mut c) => *c = content,
            Err(poisoned) => *poisoned.into_inner() = content,
        }
    }
}

pub struct ReferenceRefresher {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    document: Arc<ReferenceDocument>,
}

impl ReferenceRefresher {
    pub fn new(url: impl Into<String>, interval: Duration, document: Arc<ReferenceDocument>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?,
            url: url.into(),
            interval,
            document,
        })
    }

    /// Fetches the page once and swaps it into the cache. On failure the
    /// cached copy is left as it was.
    pub async fn refresh(&self) -> Result<usize> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ReferenceFetch(format!("{} returned {status}", self.url)));
        }
        let body = response.text().await?;
        let len = body.len();
        self.document.replace(body);
        tracing::info!(url = %self.url, bytes = len, "reference document refreshed");
        Ok(len)
    }

    /// Starts the refresh loop. The first fetch runs immediately; the task
    /// exits once `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("reference refresher shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        if let Err(e) = self.refresh().await {
                            tracing::warn!(url = %self.url, error = %e, "reference refresh failed");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    // Nothing listens on port 1, so the connection is refused straight away.
    const DEAD_URL: &str = "http://127.0.0.1:1/";

    #[test]
    fn new_document_is_empty() {
        let doc = ReferenceDocument::new();
        assert!(doc.snapshot().is_empty());
    }

    #[test]
    fn replace_swaps_content() {
        let doc = ReferenceDocument::new();
        doc.replace("first".into());
        let old = doc.snapshot();
        doc.replace("second".into());
        assert_eq!(&*old, "first");
        assert_eq!(&*doc.snapshot(), "second");
    }

    /// Serves `status` with `body` on `/` and returns the base URL.
    async fn serve_page(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route("/", get(move || async move { (status, body) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_content() -> Result<()> {
        let doc = Arc::new(ReferenceDocument::new());
        doc.replace("cached page".into());
        let refresher = ReferenceRefresher::new(DEAD_URL, Duration::from_secs(3600), doc.clone())?;
        assert!(refresher.refresh().await.is_err());
        assert_eq!(&*doc.snapshot(), "cached page");
        Ok(())
    }

    #[tokio::test]
    async fn error_status_keeps_previous_content() -> Result<()> {
        let url = serve_page(StatusCode::SERVICE_UNAVAILABLE, "maintenance").await;
        let doc = Arc::new(ReferenceDocument::new());
        doc.replace("cached page".into());
        let refresher = ReferenceRefresher::new(url, Duration::from_secs(3600), doc.clone())?;

        assert!(matches!(refresher.refresh().await, Err(Error::ReferenceFetch(_))));
        assert_eq!(&*doc.snapshot(), "cached page");
        Ok(())
    }

    #[tokio::test]
    async fn successful_refresh_replaces_content() -> Result<()> {
        let url = serve_page(StatusCode::OK, "<h1>DigitalStaff</h1>").await;
        let doc = Arc::new(ReferenceDocument::new());
        let refresher = ReferenceRefresher::new(url, Duration::from_secs(3600), doc.clone())?;

        assert_eq!(refresher.refresh().await?, "<h1>DigitalStaff</h1>".len());
        assert_eq!(&*doc.snapshot(), "<h1>DigitalStaff</h1>");
        Ok(())
    }

    #[tokio::test]
    async fn spawned_task_stops_on_cancel() -> Result<()> {
        let doc = Arc::new(ReferenceDocument::new());
        let refresher = ReferenceRefresher::new(DEAD_URL, Duration::from_millis(10), doc.clone())?;
        let shutdown = CancellationToken::new();
        let handle = refresher.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let joined = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(doc.snapshot().is_empty());
        Ok(())
    }
}
