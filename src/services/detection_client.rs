// Detection Client
// Sends sentence batches to the text analytics language detection endpoint

use reqwest::Client;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use super::config_store::{ConfigError, ServiceConfig};
use super::credentials::{CredentialSource, Credentials};
use crate::models::{DetectionRequest, DetectionResponse};

const LANGUAGES_PATH: &str = "/text/analytics/v3.1/languages";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("invalid detection input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DetectionError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            Self::JsonError(_) | Self::InvalidInput(_) | Self::Config(_) => false,
        }
    }
}

/// Anything able to detect the languages of a batch of sentences.
pub trait LanguageDetector: Send + Sync {
    /// Detect one batch. Results carry the batch position as document id.
    fn detect(
        &self,
        sentences: &[String],
    ) -> impl Future<Output = Result<DetectionResponse, DetectionError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Linear backoff after a failed `attempt` (1-based), capped.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.backoff
            .saturating_mul(attempt.min(u32::MAX as usize) as u32)
            .min(MAX_BACKOFF)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&ServiceConfig> for ClientOptions {
    fn from(cfg: &ServiceConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
            retry: RetryPolicy {
                max_attempts: cfg.max_attempts.max(1),
                backoff: Duration::from_millis(cfg.backoff_ms),
            },
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DetectionError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, DetectionError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %e, "detection.retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Split a comma-joined sentence list into batch documents.
pub fn split_joined(text: &str) -> Vec<String> {
    text.split(',').map(str::to_string).collect()
}

/// Build the batch request, rejecting empty batches and empty documents.
pub fn build_request(sentences: &[String]) -> Result<DetectionRequest, DetectionError> {
    if sentences.is_empty() {
        return Err(DetectionError::InvalidInput("batch contains no sentences".into()));
    }
    if let Some(pos) = sentences.iter().position(|s| s.trim().is_empty()) {
        return Err(DetectionError::InvalidInput(format!(
            "sentence at batch position {} is empty",
            pos
        )));
    }
    Ok(DetectionRequest::from_sentences(sentences))
}

pub struct DetectionClient {
    client: Client,
    url: String,
    api_key: String,
    options: ClientOptions,
}

impl DetectionClient {
    /// Resolve credentials up front so configuration problems surface before
    /// any request is made.
    pub fn new(source: &dyn CredentialSource, options: ClientOptions) -> Result<Self, DetectionError> {
        let Credentials { api_key, base_url } = source.credentials()?;
        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url, LANGUAGES_PATH),
            api_key,
            options,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, request: &DetectionRequest, attempt: usize) -> Result<DetectionResponse, DetectionError> {
        let start = Instant::now();

        let fut = self
            .client
            .post(&self.url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send();

        let response = tokio::time::timeout(self.options.timeout, fut)
            .await
            .map_err(|_| DetectionError::Timeout(self.options.timeout))??;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(attempt, status = status.as_u16(), latency_ms, "detection.api_error");
            return Err(DetectionError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let parsed: DetectionResponse =
            serde_json::from_str(&body).map_err(|e| DetectionError::JsonError(e.to_string()))?;

        info!(
            attempt,
            documents = request.len(),
            detected = parsed.documents.len(),
            latency_ms,
            "detection.ok"
        );
        Ok(parsed)
    }
}

impl LanguageDetector for DetectionClient {
    async fn detect(&self, sentences: &[String]) -> Result<DetectionResponse, DetectionError> {
        let request = build_request(sentences)?;
        with_retry(&self.options.retry, |attempt| self.send_once(&request, attempt)).await
    }
}
