use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::rate_limiter::RateLimiter;

/// Transport-level failures of a provider fetch. Providers turn these into
/// `ValuationError::ProviderUnavailable` at their boundary.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("unexpected payload: {0}")]
    Payload(String),
}

/// Rate-limited HTTP client shared by the statement providers.
#[derive(Clone)]
pub struct StatementHttp {
    client: Client,
    rate_limiter: RateLimiter,
    config: ProviderConfig,
}

impl StatementHttp {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::per_minute(config.rate_limit),
            config,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request with rate limiting and automatic 429 retry.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, FetchError> {
        let request = builder.build()?;
        let attempts = self.config.max_attempts.max(1);

        for attempt in 0..attempts {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| FetchError::Payload("cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            tracing::warn!(
                "Provider 429 rate limited, waiting {}s before retry {}/{}",
                self.config.retry_wait.as_secs(),
                attempt + 1,
                attempts
            );
            tokio::time::sleep(self.config.retry_wait).await;
        }

        Err(FetchError::RateLimited(attempts))
    }

    /// `send`, then fail on any non-success status and return the body.
    pub async fn get_text(&self, builder: RequestBuilder) -> Result<(reqwest::Url, String), FetchError> {
        let response = self.send(builder).await?;
        let status = response.status();
        let url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(200)
                    .collect(),
            });
        }

        Ok((url, response.text().await?))
    }
}
