//! HTTP client for the Financial Modeling Prep API.

use crate::rate_limit::RateLimiter;
use crate::validate::validate_response;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use stockpile_core::{FetchConfig, FetchError, FetchRequest};
use stockpile_store::{CacheKey, CacheStore};

/// One retrieval per call, for one (identifier, endpoint) pair.
///
/// The order of operations is fixed: cache lookup, admission, HTTP
/// exchange, status mapping, validation, write-through. A fresh cache
/// hit returns immediately and consumes no admission; a cache write
/// failure is logged and swallowed, never failing a fetch that already
/// has its data.
pub struct FmpClient {
    client: Client,
    api_key: String,
    config: FetchConfig,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for FmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FmpClient")
            .field("base_url", &self.config.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl FmpClient {
    pub fn new(
        api_key: impl Into<String>,
        config: FetchConfig,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchError::Transport {
                status: None,
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
            cache,
            limiter,
        })
    }

    /// Fetch one endpoint payload, consulting the cache first.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let key = CacheKey::for_request(request);
        if let Some(document) = self.cache.get(&key) {
            tracing::debug!(
                symbol = %request.symbol,
                endpoint = %request.endpoint,
                "Cache hit"
            );
            return Ok(document);
        }

        self.limiter.admit().await;

        let url = format!("{}/{}", self.config.base_url, request.path());
        let mut query: Vec<(&str, &str)> = request
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push(("apikey", self.api_key.as_str()));

        tracing::debug!(
            symbol = %request.symbol,
            endpoint = %request.endpoint,
            "Requesting endpoint"
        );

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                status: None,
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let document = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "authentication rejected".to_string());
                return Err(FetchError::Auth { message: body });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = parse_retry_after_secs(response.headers());
                tracing::warn!(
                    symbol = %request.symbol,
                    endpoint = %request.endpoint,
                    cooldown_secs = self.config.rate_limit_cooldown_secs,
                    "Provider rate limit hit, cooling down before returning"
                );
                tokio::time::sleep(self.config.rate_limit_cooldown()).await;
                return Err(FetchError::RateLimited { retry_after_secs });
            }
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound {
                    resource: request.path(),
                });
            }
            _ if !status.is_success() => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(FetchError::Transport {
                    status: Some(status.as_u16()),
                    message: body,
                });
            }
            _ => response.json().await.map_err(|e| FetchError::Transport {
                status: Some(status.as_u16()),
                message: format!("Failed to parse response body: {}", e),
            })?,
        };

        if let Err(err) = validate_response(request.endpoint, &document) {
            tracing::warn!(
                symbol = %request.symbol,
                endpoint = %request.endpoint,
                error = %err,
                "Response failed validation, not caching"
            );
            return Err(err);
        }

        if let Err(err) = self.cache.put(&key, document.clone()) {
            tracing::warn!(error = %err, "Cache write failed, continuing without it");
        }

        Ok(document)
    }
}

/// Parse a Retry-After header, seconds form only.
fn parse_retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
