use std::time::Duration;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::utils::retry::with_retry;

/// Shared HTTP client for registry and repository requests
///
/// Every request carries the configured timeout; transient failures are retried.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    attempts: u32,
    retry_delay: Duration,
}

impl HttpClient {
    /// Builds a client from the research configuration
    pub fn new(config: &ResearchConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/plain, text/html;q=0.9, */*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            attempts: config.http_retries.saturating_add(1),
            retry_delay: config.retry_delay(),
        })
    }

    /// Fetches `url` and decodes the body as JSON
    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get_text(url, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches `url` as text, optionally with a bearer token
    pub async fn get_text(&self, url: &str, token: Option<&str>) -> Result<String> {
        with_retry(
            || self.fetch_once(url, token),
            self.attempts,
            self.retry_delay,
            ResearchError::is_transient,
        )
        .await
    }

    /// Succeeds when `url` answers with a success status; the body is discarded
    pub async fn exists(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "existence check");
        if status.is_success() {
            Ok(())
        } else {
            Err(ResearchError::Status { url: url.to_string(), status: status.as_u16() })
        }
    }

    async fn fetch_once(&self, url: &str, token: Option<&str>) -> Result<String> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "GET");
        if !status.is_success() {
            return Err(ResearchError::Status { url: url.to_string(), status: status.as_u16() });
        }
        Ok(response.text().await?)
    }
}
