//! Plain-HTTP fetch collaborator.
//!
//! The crawl engine talks to the network through the `FetchClient` trait so
//! tests can substitute an in-memory fetcher. `HttpFetcher` is the production
//! implementation backed by reqwest.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::FetchError;

/// Result of a plain-HTTP page fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

/// Abstraction over the HTTP client used for non-rendered fetches.
pub trait FetchClient: Send + Sync {
    fn fetch(
        &self,
        url: String,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<FetchResponse, FetchError>>;
}

/// reqwest-backed fetch client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FetchClient for HttpFetcher {
    fn fetch(
        &self,
        url: String,
        timeout: Duration,
    ) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout(timeout)
                    } else {
                        FetchError::Request(e.to_string())
                    }
                })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

            Ok(FetchResponse {
                status,
                body,
                headers,
            })
        })
    }
}
