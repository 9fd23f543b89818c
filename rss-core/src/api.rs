use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coordinator::RequestToken;
use crate::error::FeedApiError;

pub const DEFAULT_API_BASE_URL: &str = "https://feed-parallel-parse-api.vercel.app";
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ParseResponse {
    #[serde(default)]
    pub feeds: Vec<RemoteFeed>,
    #[serde(default)]
    pub errors: Vec<RemoteError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFeed {
    #[serde(default)]
    pub title: String,
    /// Site link; display only, never used for matching.
    #[serde(default)]
    pub link: String,
    /// The feed endpoint as the API fetched it.
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub articles: Vec<RemoteArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteArticle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub pub_date: Option<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub url: String,
    pub message: String,
}

/// Client for the feed parsing API.
#[derive(Debug, Clone)]
pub struct FeedApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FeedApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout: DEFAULT_API_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one batch to `POST /api/parse`.
    ///
    /// The timeout applies regardless of `token`; a token invalidated while the
    /// request is in flight yields [`FeedApiError::Aborted`].
    pub async fn parse_feeds(
        &self,
        urls: &[String],
        token: Option<&RequestToken>,
    ) -> Result<ParseResponse, FeedApiError> {
        let request = ParseRequest {
            urls: urls.to_vec(),
        };
        let endpoint = format!("{}/api/parse", self.base_url);
        debug!(count = urls.len(), %endpoint, "requesting parse API");

        let send = async {
            let response = self.client.post(&endpoint).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FeedApiError::Status(status.as_u16()));
            }
            let bytes = response.bytes().await?;
            Ok::<_, FeedApiError>(serde_json::from_slice::<ParseResponse>(&bytes)?)
        };
        let timed = tokio::time::timeout(self.timeout, send);

        let outcome = match token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(FeedApiError::Aborted),
                    outcome = timed => outcome,
                }
            }
            None => timed.await,
        };

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(FeedApiError::Network(err))) if err.is_timeout() => {
                Err(FeedApiError::Timeout(self.timeout))
            }
            Ok(Err(err)) => {
                warn!(error = %err, "parse API request failed");
                Err(err)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "parse API request timed out");
                Err(FeedApiError::Timeout(self.timeout))
            }
        }
    }
}
