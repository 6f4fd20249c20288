//! Recent external headlines from a public news search page.

pub mod parse;

use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Datelike;
use hrag_core::config::{MAX_HEADLINES, WebConfig};
use hrag_core::{Query, RetrievalError, WebFetcher};
use tracing::debug;

pub use parse::extract_headlines;

const USER_AGENT: &str = concat!("hrag/", env!("CARGO_PKG_VERSION"));

/// [`WebFetcher`] that GETs `<endpoint>?q=<terms>` and reads anchor text.
#[derive(Debug, Clone)]
pub struct NewsFetcher {
    agent: ureq::Agent,
    endpoint: String,
    topic: String,
    lookback_years: i32,
    max_headlines: usize,
}

impl NewsFetcher {
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an http(s) URL.
    pub fn new(config: &WebConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            bail!("web.endpoint must be an http(s) URL, got '{endpoint}'");
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .build();
        Ok(Self {
            agent,
            endpoint,
            topic: config.topic.trim().to_string(),
            lookback_years: config.lookback_years.max(0),
            max_headlines: config.max_headlines.clamp(1, MAX_HEADLINES),
        })
    }

    /// Search terms for `query` as of `year`: the query, the topic, and a
    /// recency filter, e.g. `5G churn telecom after:2025`.
    #[must_use]
    pub fn search_terms(&self, query: &Query, year: i32) -> String {
        let recency = format!("after:{}", year - self.lookback_years);
        [query.as_str(), self.topic.as_str(), recency.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn fetch_blocking(&self, terms: &str) -> Result<Vec<String>, RetrievalError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("q", terms)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) if code == 429 || code >= 500 => {
                    RetrievalError::FetchUnavailable(format!("search returned status {code}"))
                }
                ureq::Error::Status(code, _) => {
                    RetrievalError::Failed(format!("search returned status {code}"))
                }
                ureq::Error::Transport(t) => RetrievalError::FetchUnavailable(t.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|e| RetrievalError::Parse(format!("failed to read response body: {e}")))?;
        let headlines = extract_headlines(&body, self.max_headlines)?;
        debug!(count = headlines.len(), "headlines extracted");
        Ok(headlines)
    }
}

#[async_trait]
impl WebFetcher for NewsFetcher {
    async fn fetch_headlines(&self, query: &Query) -> Result<Vec<String>, RetrievalError> {
        let terms = self.search_terms(query, chrono::Local::now().year());
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.fetch_blocking(&terms))
            .await
            .map_err(|e| RetrievalError::Failed(format!("web fetch task failed: {e}")))?
    }
}
