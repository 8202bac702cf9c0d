//! OpenAI chat completions provider.

use crate::{InsightKind, InsightProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stockpile_core::{FetchError, LlmConfig};
use stockpile_store::{CacheKey, CacheStore, CacheTtl};
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Chat completions client with concurrency and spacing limits.
///
/// Generated texts are cached persistently: an insight for a given
/// (kind, symbol) pair is asked for once, ever, as long as the cache
/// file survives. Retryable failures back off exponentially before the
/// error is surfaced to the caller; a rejected key is returned
/// immediately.
pub struct OpenAiInsightProvider {
    client: Client,
    api_key: String,
    config: LlmConfig,
    cache: CacheStore,
    limiter: Arc<Semaphore>,
    /// Milliseconds since `start_time` of the most recent request.
    last_request: AtomicU64,
    start_time: Instant,
}

impl std::fmt::Debug for OpenAiInsightProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiInsightProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ===== WIRE TYPES =====

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiInsightProvider {
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchError::Transport {
                status: None,
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        let cache = CacheStore::open(config.cache_path.clone(), CacheTtl::Persistent);
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
            cache,
            limiter,
            last_request: AtomicU64::new(0),
            start_time: Instant::now(),
        })
    }

    /// Space requests at least `min_request_interval` apart.
    async fn enforce_min_interval(&self) {
        let min_ms = self.config.min_request_interval_ms;
        if min_ms == 0 {
            return;
        }
        let last = self.last_request.load(Ordering::Acquire);
        let now = self.start_time.elapsed().as_millis() as u64;
        let since = now.saturating_sub(last);
        if last > 0 && since < min_ms {
            tokio::time::sleep(Duration::from_millis(min_ms - since)).await;
        }
        self.last_request
            .store(self.start_time.elapsed().as_millis() as u64, Ordering::Release);
    }

    async fn request_completion(
        &self,
        kind: InsightKind,
        symbol: &str,
    ) -> Result<String, FetchError> {
        let _permit =
            self.limiter
                .acquire()
                .await
                .map_err(|_| FetchError::Transport {
                    status: None,
                    message: "Request limiter closed".to_string(),
                })?;
        self.enforce_min_interval().await;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: kind.system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: kind.user_prompt(symbol),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                status: None,
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "authentication rejected".to_string());
                Err(FetchError::Auth { message: body })
            }
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
                retry_after_secs: parse_retry_after_secs(response.headers()),
            }),
            _ if !status.is_success() => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(FetchError::Transport {
                    status: Some(status.as_u16()),
                    message: body,
                })
            }
            _ => {
                let completion: ChatCompletionResponse =
                    response.json().await.map_err(|e| FetchError::Transport {
                        status: Some(status.as_u16()),
                        message: format!("Failed to parse response body: {}", e),
                    })?;
                completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .map(|content| content.trim().to_string())
                    .filter(|content| !content.is_empty())
                    .ok_or_else(|| FetchError::Validation {
                        endpoint: "chat/completions".to_string(),
                        reason: "no content in completion".to_string(),
                    })
            }
        }
    }
}

#[async_trait]
impl InsightProvider for OpenAiInsightProvider {
    async fn generate(&self, kind: InsightKind, symbol: &str) -> Result<String, FetchError> {
        let key = CacheKey::for_messages(&kind.messages(symbol));
        if let Some(cached) = self
            .cache
            .get(&key)
            .and_then(|v| v.as_str().map(str::to_string))
        {
            tracing::debug!(symbol, kind = %kind, "Insight cache hit");
            return Ok(cached);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.request_completion(kind, symbol).await {
                Ok(text) => {
                    if let Err(err) = self.cache.put(&key, Value::String(text.clone())) {
                        tracing::warn!(error = %err, "Insight cache write failed, continuing");
                    }
                    return Ok(text);
                }
                Err(err @ FetchError::Auth { .. }) => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries.max(1) {
                        tracing::warn!(
                            symbol,
                            kind = %kind,
                            error = %err,
                            attempts = attempt,
                            "Insight generation failed"
                        );
                        return Err(err);
                    }
                    let wait = Duration::from_secs(1u64 << attempt.min(6));
                    tracing::warn!(
                        symbol,
                        kind = %kind,
                        error = %err,
                        wait_secs = wait.as_secs(),
                        "Insight generation failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
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
