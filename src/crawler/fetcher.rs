//! Resilient HTTP transport
//!
//! This module issues every GET the crawler makes:
//! - Attaching the identity headers and optional cache-buster parameter
//! - Detecting soft-block pages before looking at the status
//! - Retrying transient failures with capped exponential backoff
//! - Classifying terminal failures for the frontier

use crate::config::Config;
use crate::crawler::backoff::{FailureCause, RetryPolicy, RetryState};
use crate::crawler::blocking::BlockDetector;
use crate::crawler::shutdown::Shutdown;
use crate::identity::Identity;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Terminal outcome of a failed fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Retries exhausted for {url} after {attempts} requests (last failure: {last})")]
    Exhausted {
        url: String,
        attempts: u32,
        last: FailureCause,
    },

    #[error("Blocked at {url} (status {status}, marker '{marker}')")]
    Blocked {
        url: String,
        status: u16,
        marker: String,
        body: String,
    },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Fetch of {url} interrupted by shutdown")]
    Interrupted { url: String },

    #[error("Could not build request for {url}: {reason}")]
    Request { url: String, reason: String },
}

impl FetchError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Requests issued, counting retries
    pub attempts: u32,
}

/// Builds the HTTP client shared by every fetch
///
/// # Arguments
///
/// * `timeout` - Per-request timeout, covering connect and body read
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Wraps the HTTP client with block detection and retries
pub struct ResilientTransport {
    client: Client,
    policy: RetryPolicy,
    detector: BlockDetector,
    cache_buster_param: Option<String>,
}

impl ResilientTransport {
    pub fn new(
        client: Client,
        policy: RetryPolicy,
        detector: BlockDetector,
        cache_buster_param: Option<String>,
    ) -> Self {
        Self {
            client,
            policy,
            detector,
            cache_buster_param,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(Duration::from_secs(config.crawler.request_timeout_secs))?;
        Ok(Self::new(
            client,
            RetryPolicy::from_config(&config.retry),
            BlockDetector::from_config(&config.blocking),
            config.identity.cache_buster_param.clone(),
        ))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL under the given identity
    ///
    /// Every body is checked for block markers first; a blocked response is
    /// returned as `FetchError::Blocked` whatever its status and is never
    /// retried. Retryable statuses and network failures are retried up to
    /// `max_retries` times. Any other non-success status is terminal.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `extra_headers` - Headers that override the identity's
    /// * `identity` - Header bundle for this fetch
    /// * `shutdown` - Cuts backoff sleeps short
    pub async fn fetch(
        &self,
        url: &Url,
        extra_headers: &HeaderMap,
        identity: &Identity,
        shutdown: &mut Shutdown,
    ) -> Result<FetchedPage, FetchError> {
        let mut headers = identity.to_headers().map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        let request_url = self.request_url(url, identity);
        let mut state = RetryState::new();

        loop {
            let cause = match self
                .client
                .get(request_url.clone())
                .headers(headers.clone())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let final_url = response.url().clone();
                    let response_headers = response.headers().clone();

                    match response.text().await {
                        Ok(body) => {
                            if let Some(marker) = self.detector.detect(&body) {
                                return Err(FetchError::Blocked {
                                    url: url.to_string(),
                                    status,
                                    marker: marker.to_string(),
                                    body,
                                });
                            }
                            if (200..300).contains(&status) {
                                return Ok(FetchedPage {
                                    url: final_url,
                                    status,
                                    headers: response_headers,
                                    body,
                                    attempts: state.requests_made(),
                                });
                            }
                            if !self.policy.is_retryable_status(status) {
                                return Err(FetchError::Status {
                                    url: url.to_string(),
                                    status,
                                });
                            }
                            FailureCause::Status(status)
                        }
                        Err(e) => classify_error(&e),
                    }
                }
                Err(e) if e.is_builder() => {
                    return Err(FetchError::Request {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => classify_error(&e),
            };

            match state.record_failure(&self.policy, cause.clone()) {
                Some(delay) => {
                    tracing::warn!(
                        url = %url,
                        attempt = state.attempt,
                        cause = %cause,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    if !shutdown.sleep(delay).await {
                        return Err(FetchError::Interrupted {
                            url: url.to_string(),
                        });
                    }
                }
                None => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: state.requests_made(),
                        last: cause,
                    });
                }
            }
        }
    }

    fn request_url(&self, url: &Url, identity: &Identity) -> Url {
        match &self.cache_buster_param {
            Some(param) => {
                let mut busted = url.clone();
                busted
                    .query_pairs_mut()
                    .append_pair(param, &identity.cache_buster);
                busted
            }
            None => url.clone(),
        }
    }
}

fn classify_error(error: &reqwest::Error) -> FailureCause {
    if error.is_timeout() {
        FailureCause::Timeout
    } else {
        FailureCause::Connection(error.to_string())
    }
}
