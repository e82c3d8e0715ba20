//! Blocking HTTP client for an Ollama-compatible text-completion backend.
//!
//! Provides `OllamaClient` plus the `GenerationClient` trait the orchestrator
//! depends on, along with error types, a builder, and transient-failure retry.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Per-request timeout for a single generation call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when talking to the generation backend.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Backend API-specific errors (e.g. a malformed response body)
    #[error("Ollama API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Trait for generation backend operations.
///
/// The orchestrator only depends on this trait, which keeps it mockable in
/// unit tests and indifferent to the transport behind it.
pub trait GenerationClient: Send + Sync {
    /// Generates text for `prompt` at the given sampling temperature.
    ///
    /// Returns the trimmed generated text. Implementations must propagate
    /// network, timeout, and non-2xx failures as errors rather than returning
    /// empty text silently.
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, OllamaError>;
}

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use raglet::ollama::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3:8b")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
}

impl OllamaClientBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the backend (e.g. "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier sent with every request (e.g. "llama3:8b").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// Unset options fall back to the crate defaults. The base URL is
    /// validated eagerly so a bad endpoint fails here instead of on the first
    /// question.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::InvalidUrl` when the base URL does not parse,
    /// or `OllamaError::Network` when the underlying HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<OllamaClient, OllamaError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| crate::config::DEFAULT_BASE_URL.to_string());
        let model = self
            .model
            .unwrap_or_else(|| crate::config::DEFAULT_MODEL.to_string());

        reqwest::Url::parse(&base_url)
            .map_err(|e| OllamaError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(OllamaError::Network)?;

        Ok(OllamaClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

/// Synchronous HTTP client for an Ollama-compatible `/api/generate` endpoint.
///
/// Construct via [`OllamaClientBuilder`]. Every call blocks the caller until
/// the backend responds or the request times out.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model identifier configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Lists models available on the backend, largest first.
    ///
    /// Fetches the `/api/tags` endpoint and returns model names.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the backend answers with a
    /// non-2xx status.
    pub fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(classify_transport)?;

        if !response.status().is_success() {
            return Err(OllamaError::Http {
                status: response.status().as_u16(),
            });
        }

        let json: serde_json::Value = response.json().map_err(classify_transport)?;

        let mut models: Vec<(String, u64)> = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| {
                        let name = model.get("name").and_then(|n| n.as_str())?;
                        let size = model.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
                        Some((name.to_string(), size))
                    })
                    .collect()
            })
            .unwrap_or_default();

        models.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(models.into_iter().map(|(name, _)| name).collect())
    }

    fn generate_internal(&self, prompt: &str, temperature: f32) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });

        debug!(model = %self.model, temperature, prompt_len = prompt.len(), "generation request");

        retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(classify_transport)?;

            let status = response.status();
            if !status.is_success() {
                // 4xx won't be retried, 5xx will.
                return Err(OllamaError::Http {
                    status: status.as_u16(),
                });
            }

            let json: serde_json::Value = response.json().map_err(classify_transport)?;

            json.get("response")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| OllamaError::Api {
                    message: "Missing 'response' field in API response".to_string(),
                })
        })
    }
}

impl GenerationClient for OllamaClient {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, OllamaError> {
        self.generate_internal(prompt, temperature)
    }
}

/// Maps a transport-level `reqwest` error onto the timeout or network variant.
fn classify_transport(error: reqwest::Error) -> OllamaError {
    if error.is_timeout() {
        OllamaError::Timeout(error)
    } else {
        OllamaError::Network(error)
    }
}

/// Retries an operation with exponential backoff.
///
/// The operation runs up to 4 times total, sleeping 1s, 2s, and 4s between
/// attempts. Only transient errors (HTTP 5xx, network failures, timeouts) are
/// retried; client errors return immediately.
pub fn retry_with_backoff<F, T>(mut f: F) -> Result<T, OllamaError>
where
    F: FnMut() -> Result<T, OllamaError>,
{
    const DELAYS: [u64; 3] = [1, 2, 4]; // seconds

    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) => {
            if !should_retry(&e) {
                return Err(e);
            }
            e
        }
    };

    for &delay_secs in &DELAYS {
        thread::sleep(Duration::from_secs(delay_secs));

        match f() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Returns true for transient errors worth retrying.
fn should_retry(error: &OllamaError) -> bool {
    match error {
        OllamaError::Network(_) => true,
        OllamaError::Timeout(_) => true,
        OllamaError::Http { status } => (500..600).contains(status),
        OllamaError::Serialization(_) => false,
        OllamaError::Api { .. } => false,
        OllamaError::InvalidUrl(_) => false,
    }
}
